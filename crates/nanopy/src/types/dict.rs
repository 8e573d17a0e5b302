use hashbrown::HashTable;

use crate::{
    exception_private::{ExcType, RunError, RunResult},
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Python `dict`: an insertion-ordered mapping.
///
/// # Storage Strategy
/// A `HashTable<usize>` maps key hashes to indices in a dense `Vec<DictEntry>`, so
/// lookups are O(1) and iteration follows insertion order as in Python 3.7+.
///
/// Key comparison needs the heap (heap strings and tuples compare by content), so
/// lookups borrow the heap immutably. Dicts that already live in the heap are
/// updated in two phases by [`dict_set`] and [`dict_pop`].
#[derive(Debug, Default)]
pub(crate) struct Dict {
    /// indices mapping from the entry hash to its index.
    indices: HashTable<usize>,
    /// entries is a dense vec maintaining entry order.
    entries: Vec<DictEntry>,
}

#[derive(Debug)]
struct DictEntry {
    key: Value,
    value: Value,
    /// the hash is needed here for correct use of insert_unique
    hash: u64,
}

impl Dict {
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

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|entry| (&entry.key, &entry.value))
    }

    /// The pair at position `index` in insertion order.
    pub fn entry_at(&self, index: usize) -> Option<(Value, Value)> {
        self.entries.get(index).map(|entry| (entry.key, entry.value))
    }

    pub fn get(&self, key: Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> RunResult<Option<Value>> {
        let (_, index) = self.find_index_hash(key, heap, interns)?;
        Ok(index.map(|i| self.entries[i].value))
    }

    /// Inserts or replaces `key`, returning the previous value.
    ///
    /// Only for dicts that are not in the heap yet, such as a display being built.
    pub fn set(
        &mut self,
        key: Value,
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<Option<Value>> {
        let (hash, index) = self.find_index_hash(key, heap, interns)?;
        Ok(self.insert_found(hash, index, key, value))
    }

    /// Returns the key hash and, if present, the entry index of `key`.
    fn find_index_hash(
        &self,
        key: Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
    ) -> RunResult<(u64, Option<usize>)> {
        let hash = key
            .py_hash(heap, interns)
            .ok_or_else(|| ExcType::type_error_unhashable(&key.type_name(heap, interns)))?;
        let index = self
            .indices
            .find(hash, |&i| key.py_eq(self.entries[i].key, heap, interns))
            .copied();
        Ok((hash, index))
    }

    /// Second phase of an insert, once the lookup result is known.
    fn insert_found(&mut self, hash: u64, found: Option<usize>, key: Value, value: Value) -> Option<Value> {
        if let Some(index) = found {
            // replace in place so insertion order is kept
            Some(std::mem::replace(&mut self.entries[index].value, value))
        } else {
            let index = self.entries.len();
            self.entries.push(DictEntry { key, value, hash });
            let entries = &self.entries;
            self.indices.insert_unique(hash, index, |&i| entries[i].hash);
            None
        }
    }

    fn remove_at(&mut self, hash: u64, removed_index: usize) -> (Value, Value) {
        if let Ok(entry) = self.indices.find_entry(hash, |&i| i == removed_index) {
            entry.remove();
        }
        let entry = self.entries.remove(removed_index);
        // entries after the removed slot shift left by one
        for index in &mut self.indices {
            if *index > removed_index {
                *index -= 1;
            }
        }
        (entry.key, entry.value)
    }
}

/// `d[key] = value` on a dict that lives in the heap.
///
/// New keys are charged to the heap and the allocation budget.
pub(crate) fn dict_set(
    heap: &mut Heap<impl ResourceTracker>,
    dict_id: HeapId,
    key: Value,
    value: Value,
    interns: &Interns,
) -> RunResult<()> {
    let (hash, found) = match heap.get(dict_id) {
        HeapData::Dict(dict) => dict.find_index_hash(key, heap, interns)?,
        _ => return Err(RunError::internal("dict_set: handle is not a dict")),
    };
    if found.is_none() {
        heap.grow(dict_id, 1)?;
    }
    if let HeapData::Dict(dict) = heap.get_mut(dict_id) {
        dict.insert_found(hash, found, key, value);
    }
    Ok(())
}

/// Removes `key` from a heap dict, returning its value if it was present.
pub(crate) fn dict_pop(
    heap: &mut Heap<impl ResourceTracker>,
    dict_id: HeapId,
    key: Value,
    interns: &Interns,
) -> RunResult<Option<Value>> {
    let (hash, found) = match heap.get(dict_id) {
        HeapData::Dict(dict) => dict.find_index_hash(key, heap, interns)?,
        _ => return Err(RunError::internal("dict_pop: handle is not a dict")),
    };
    let Some(index) = found else {
        return Ok(None);
    };
    match heap.get_mut(dict_id) {
        HeapData::Dict(dict) => Ok(Some(dict.remove_at(hash, index).1)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intern::InternerBuilder, resource::NoLimitTracker, types::List};

    fn interns() -> Interns {
        Interns::new(InternerBuilder::new(""))
    }

    #[test]
    fn numeric_keys_follow_python_equality() {
        let heap = Heap::new(NoLimitTracker);
        let interns = interns();
        let mut dict = Dict::new();
        dict.set(Value::Int(1), Value::Int(10), &heap, &interns).unwrap();
        let old = dict.set(Value::Float(1.0), Value::Int(20), &heap, &interns).unwrap();
        assert!(matches!(old, Some(Value::Int(10))));
        assert_eq!(dict.len(), 1);
        assert!(matches!(
            dict.get(Value::Bool(true), &heap, &interns).unwrap(),
            Some(Value::Int(20))
        ));
    }

    #[test]
    fn unhashable_keys_are_rejected() {
        let mut heap = Heap::new(NoLimitTracker);
        let interns = interns();
        let list = heap.allocate(HeapData::List(List::new(vec![]))).unwrap();
        let mut dict = Dict::new();
        let err = dict.set(Value::Ref(list), Value::None, &heap, &interns).unwrap_err();
        assert!(err.is_exception_type(ExcType::TypeError));
    }

    #[test]
    fn pop_keeps_remaining_entries_findable() {
        let mut heap = Heap::new(NoLimitTracker);
        let interns = interns();
        let mut dict = Dict::new();
        for i in 0..5 {
            dict.set(Value::Int(i), Value::Int(i * 100), &heap, &interns).unwrap();
        }
        let id = heap.allocate(HeapData::Dict(dict)).unwrap();
        let popped = dict_pop(&mut heap, id, Value::Int(1), &interns).unwrap();
        assert!(matches!(popped, Some(Value::Int(100))));
        assert!(dict_pop(&mut heap, id, Value::Int(1), &interns).unwrap().is_none());

        dict_set(&mut heap, id, Value::Int(9), Value::Int(900), &interns).unwrap();
        let HeapData::Dict(dict) = heap.get(id) else {
            panic!("expected dict");
        };
        let keys: Vec<_> = dict.iter().filter_map(|(k, _)| k.as_int()).collect();
        assert_eq!(keys, vec![0, 2, 3, 4, 9]);
        for key in [0, 2, 3, 4, 9] {
            assert!(dict.get(Value::Int(key), &heap, &interns).unwrap().is_some());
        }
    }
}
