use crate::value::Value;

/// Python `tuple`: immutable once constructed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tuple(Box<[Value]>);

impl Tuple {
    pub fn new(items: Vec<Value>) -> Self {
        Self(items.into_boxed_slice())
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
