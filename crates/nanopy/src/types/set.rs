use hashbrown::HashTable;

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Python `set`.
///
/// Same storage strategy as [`super::Dict`] without the values: a `HashTable<usize>`
/// over a dense entry vector, so sets print in insertion order.
#[derive(Debug, Default)]
pub(crate) struct Set {
    indices: HashTable<usize>,
    entries: Vec<SetEntry>,
}

#[derive(Debug)]
struct SetEntry {
    value: Value,
    hash: u64,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|entry| &entry.value)
    }

    pub fn value_at(&self, index: usize) -> Option<Value> {
        self.entries.get(index).map(|entry| entry.value)
    }

    pub fn contains(&self, value: Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<bool> {
        Ok(self.find_index_hash(value, heap, interns)?.1.is_some())
    }

    /// Adds `value` to a set not yet in the heap; returns false if it was already present.
    pub fn add(&mut self, value: Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<bool> {
        let (hash, found) = self.find_index_hash(value, heap, interns)?;
        if found.is_some() {
            return Ok(false);
        }
        self.insert_new(hash, value);
        Ok(true)
    }

    fn find_index_hash(
        &self,
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<(u64, Option<usize>)> {
        let hash = value
            .py_hash(heap, interns)
            .ok_or_else(|| ExcType::type_error_unhashable(&value.type_name(heap, interns)))?;
        let index = self
            .indices
            .find(hash, |&i| value.py_eq(self.entries[i].value, heap, interns))
            .copied();
        Ok((hash, index))
    }

    fn insert_new(&mut self, hash: u64, value: Value) {
        let index = self.entries.len();
        self.entries.push(SetEntry { value, hash });
        let entries = &self.entries;
        self.indices.insert_unique(hash, index, |&i| entries[i].hash);
    }

    fn remove_at(&mut self, hash: u64, removed_index: usize) {
        if let Ok(entry) = self.indices.find_entry(hash, |&i| i == removed_index) {
            entry.remove();
        }
        self.entries.remove(removed_index);
        for index in &mut self.indices {
            if *index > removed_index {
                *index -= 1;
            }
        }
    }
}

/// `s.add(value)` on a set that lives in the heap; returns false if already present.
pub(crate) fn set_add(
    heap: &mut Heap<impl ResourceTracker>,
    set_id: HeapId,
    value: Value,
    interns: &Interns,
) -> RunResult<bool> {
    let (hash, found) = match heap.get(set_id) {
        HeapData::Set(set) => set.find_index_hash(value, heap, interns)?,
        _ => return Err(RunError::internal("set_add: handle is not a set")),
    };
    if found.is_some() {
        return Ok(false);
    }
    heap.grow(set_id, 1)?;
    if let HeapData::Set(set) = heap.get_mut(set_id) {
        set.insert_new(hash, value);
    }
    Ok(true)
}

/// Removes `value` from a heap set; returns false if it was absent.
pub(crate) fn set_discard(
    heap: &mut Heap<impl ResourceTracker>,
    set_id: HeapId,
    value: Value,
    interns: &Interns,
) -> RunResult<bool> {
    let (hash, found) = match heap.get(set_id) {
        HeapData::Set(set) => set.find_index_hash(value, heap, interns)?,
        _ => return Err(RunError::internal("set_discard: handle is not a set")),
    };
    let Some(index) = found else {
        return Ok(false);
    };
    if let HeapData::Set(set) = heap.get_mut(set_id) {
        set.remove_at(hash, index);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intern::InternerBuilder, resource::NoLimitTracker, types::Str};

    #[test]
    fn heap_and_interned_strings_deduplicate() {
        let mut interner = InternerBuilder::new("");
        let literal = interner.intern("apple");
        let interns = Interns::new(interner);
        let mut heap = Heap::new(NoLimitTracker);
        let runtime = heap.allocate(HeapData::Str(Str::from("apple"))).unwrap();

        let mut set = Set::new();
        assert!(set.add(Value::InternString(literal), &heap, &interns).unwrap());
        assert!(!set.add(Value::Ref(runtime), &heap, &interns).unwrap());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn discard_then_add_keeps_lookups_consistent() {
        let mut heap = Heap::new(NoLimitTracker);
        let interns = Interns::new(InternerBuilder::new(""));
        let mut set = Set::new();
        for i in 0..4 {
            set.add(Value::Int(i), &heap, &interns).unwrap();
        }
        let id = heap.allocate(HeapData::Set(set)).unwrap();
        assert!(set_discard(&mut heap, id, Value::Int(0), &interns).unwrap());
        assert!(!set_discard(&mut heap, id, Value::Int(0), &interns).unwrap());
        assert!(set_add(&mut heap, id, Value::Int(0), &interns).unwrap());

        let HeapData::Set(set) = heap.get(id) else {
            panic!("expected set");
        };
        let order: Vec<_> = set.iter().filter_map(|v| v.as_int()).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
        assert!(set.contains(Value::Int(3), &heap, &interns).unwrap());
    }
}
