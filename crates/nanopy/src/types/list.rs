use crate::value::Value;

/// Python `list`: an ordered, mutable sequence.
#[derive(Debug, Clone, Default)]
pub(crate) struct List(Vec<Value>);

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        Self(items)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn as_vec_mut(&mut self) -> &mut Vec<Value> {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.get(index).copied()
    }

    pub fn append(&mut self, value: Value) {
        self.0.push(value);
    }

    /// `list.insert(i, x)`: the index is clamped into range like Python does.
    pub fn insert(&mut self, index: i64, value: Value) {
        let len = self.0.len();
        let position = match normalize_index(index, len) {
            Some(position) => position,
            None if index < 0 => 0,
            None => len,
        };
        self.0.insert(position, value);
    }

    /// `list.pop(i)`; `None` when the list is empty or the index is out of range.
    pub fn pop(&mut self, index: Option<i64>) -> Option<Value> {
        match index {
            None => self.0.pop(),
            Some(index) => {
                let position = normalize_index(index, self.0.len())?;
                Some(self.0.remove(position))
            }
        }
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.0[index] = value;
    }
}

/// Maps a Python index (negative counts from the end) into `0..len`.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len_i64 = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len_i64 } else { index };
    if (0..len_i64).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(list: &List) -> Vec<i64> {
        list.as_slice().iter().filter_map(|v| v.as_int()).collect()
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }

    #[test]
    fn insert_clamps_and_pop_removes() {
        let mut list = List::new(vec![Value::Int(1), Value::Int(2)]);
        list.insert(100, Value::Int(3));
        list.insert(-100, Value::Int(0));
        assert_eq!(ints(&list), vec![0, 1, 2, 3]);
        assert_eq!(list.pop(Some(1)).and_then(Value::as_int), Some(1));
        assert_eq!(list.pop(None).and_then(Value::as_int), Some(3));
        assert!(list.pop(Some(5)).is_none());
    }
}
