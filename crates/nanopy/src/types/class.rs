use indexmap::IndexMap;

use crate::{
    heap::{Heap, HeapData, HeapId},
    intern::StringId,
    resource::ResourceTracker,
    value::Value,
};

/// A user-defined class: its name, the single optional parent, and the bindings
/// made by its body.
///
/// The parent is always an existing class when the `class` statement runs, so the
/// chain cannot form a cycle.
#[derive(Debug)]
pub(crate) struct ClassObject {
    pub name: StringId,
    pub parent: Option<HeapId>,
    pub attrs: IndexMap<StringId, Value>,
}

impl ClassObject {
    pub fn new(name: StringId, parent: Option<HeapId>, attrs: IndexMap<StringId, Value>) -> Self {
        Self { name, parent, attrs }
    }
}

/// An instance of a user-defined class.
#[derive(Debug)]
pub(crate) struct Instance {
    /// Traced like any other reference, so a class lives as long as its instances.
    pub class: HeapId,
    pub attrs: IndexMap<StringId, Value>,
}

impl Instance {
    pub fn new(class: HeapId) -> Self {
        Self {
            class,
            attrs: IndexMap::new(),
        }
    }
}

/// A function looked up through a class and bound to an instance.
///
/// Method calls (`obj.m()`) bind the receiver directly; this object only exists
/// when a method is read without being called.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundMethod {
    pub instance: Value,
    pub function: HeapId,
}

/// Finds `name` on `class_id` or the first ancestor that defines it.
pub(crate) fn lookup_class_attr(heap: &Heap<impl ResourceTracker>, class_id: HeapId, name: StringId) -> Option<Value> {
    let mut current = Some(class_id);
    while let Some(id) = current {
        let HeapData::Class(class) = heap.get(id) else {
            return None;
        };
        if let Some(value) = class.attrs.get(&name) {
            return Some(*value);
        }
        current = class.parent;
    }
    None
}

/// Whether `class_id` is `target` or inherits from it.
pub(crate) fn is_subclass(heap: &Heap<impl ResourceTracker>, class_id: HeapId, target: HeapId) -> bool {
    let mut current = Some(class_id);
    while let Some(id) = current {
        if id == target {
            return true;
        }
        current = match heap.get(id) {
            HeapData::Class(class) => class.parent,
            _ => None,
        };
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{intern::StaticStrings, resource::NoLimitTracker};

    #[test]
    fn lookup_walks_the_parent_chain() {
        let mut heap = Heap::new(NoLimitTracker);
        let speak = StringId::from_ascii(b's');
        let mut base_attrs = IndexMap::new();
        base_attrs.insert(speak, Value::Int(1));
        base_attrs.insert(StaticStrings::DunderInit.into(), Value::Int(2));
        let base = heap
            .allocate(HeapData::Class(ClassObject::new(StringId::default(), None, base_attrs)))
            .unwrap();
        let mut child_attrs = IndexMap::new();
        child_attrs.insert(speak, Value::Int(3));
        let child = heap
            .allocate(HeapData::Class(ClassObject::new(StringId::default(), Some(base), child_attrs)))
            .unwrap();

        assert!(matches!(lookup_class_attr(&heap, child, speak), Some(Value::Int(3))));
        assert!(matches!(
            lookup_class_attr(&heap, child, StaticStrings::DunderInit.into()),
            Some(Value::Int(2))
        ));
        assert!(lookup_class_attr(&heap, child, StringId::from_ascii(b'z')).is_none());
        assert!(is_subclass(&heap, child, base));
        assert!(!is_subclass(&heap, base, child));
    }
}
