//! The scope chain: name-to-value maps linked to their enclosing scope.
//!
//! Scopes are heap objects like any other. A call frame roots its scope while the
//! call runs; a function object roots the scope it was defined in for as long as the
//! function itself is reachable. Nothing here frees a scope: when neither holds it
//! any more, the collector reclaims it.

use indexmap::IndexMap;

use crate::{
    heap::{Heap, HeapData, HeapId},
    intern::StringId,
    resource::{ResourceError, ResourceTracker},
    value::Value,
};

/// What created a scope, which decides how names resolve through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    /// The single top-level scope of a program or REPL session.
    Module,
    Function,
    /// A class body; its bindings become the class attributes.
    Class,
}

#[derive(Debug)]
pub(crate) struct Scope {
    vars: IndexMap<StringId, Value>,
    pub parent: Option<HeapId>,
    pub kind: ScopeKind,
}

impl Scope {
    pub fn new(parent: Option<HeapId>, kind: ScopeKind) -> Self {
        Self {
            vars: IndexMap::new(),
            parent,
            kind,
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn get(&self, name: StringId) -> Option<Value> {
        self.vars.get(&name).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.vars.values()
    }

    pub fn vars(&self) -> &IndexMap<StringId, Value> {
        &self.vars
    }
}

/// A name that no scope in the chain binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NameUnbound;

/// Allocates a new, empty scope whose parent is `parent`.
pub(crate) fn enter_scope(
    heap: &mut Heap<impl ResourceTracker>,
    parent: Option<HeapId>,
    kind: ScopeKind,
) -> Result<HeapId, ResourceError> {
    heap.allocate(HeapData::Scope(Scope::new(parent, kind)))
}

fn scope(heap: &Heap<impl ResourceTracker>, id: HeapId) -> &Scope {
    match heap.get(id) {
        HeapData::Scope(scope) => scope,
        other => panic!("scope chain reached a {}", other.type_name()),
    }
}

fn scope_mut(heap: &mut Heap<impl ResourceTracker>, id: HeapId) -> &mut Scope {
    match heap.get_mut(id) {
        HeapData::Scope(scope) => scope,
        other => panic!("scope chain reached a {}", other.type_name()),
    }
}

/// Resolves `name` from `start` outward.
///
/// The starting scope is always searched; enclosing class scopes are skipped, so a
/// method body never sees the bare names of its class.
pub(crate) fn lookup(heap: &Heap<impl ResourceTracker>, start: HeapId, name: StringId) -> Option<Value> {
    let first = scope(heap, start);
    if let Some(value) = first.get(name) {
        return Some(value);
    }
    let mut current = first.parent;
    while let Some(id) = current {
        let s = scope(heap, id);
        if s.kind != ScopeKind::Class
            && let Some(value) = s.get(name)
        {
            return Some(value);
        }
        current = s.parent;
    }
    None
}

/// Binds `name` in `scope_id` itself, shadowing any outer binding.
pub(crate) fn define(heap: &mut Heap<impl ResourceTracker>, scope_id: HeapId, name: StringId, value: Value) {
    scope_mut(heap, scope_id).vars.insert(name, value);
}

/// Rebinds the nearest existing binding of `name`, searching from `start` outward
/// and skipping class scopes.
///
/// If nothing binds the name, a module scope gets a fresh binding (top-level
/// assignment declares); any other start scope reports [`NameUnbound`].
pub(crate) fn assign(
    heap: &mut Heap<impl ResourceTracker>,
    start: HeapId,
    name: StringId,
    value: Value,
) -> Result<(), NameUnbound> {
    match find_binding(heap, start, name) {
        Some(target) => {
            define(heap, target, name, value);
            Ok(())
        }
        None if scope(heap, start).kind == ScopeKind::Module => {
            define(heap, start, name, value);
            Ok(())
        }
        None => Err(NameUnbound),
    }
}

/// The nearest non-class scope from `start` outward that binds `name`.
pub(crate) fn find_binding(heap: &Heap<impl ResourceTracker>, start: HeapId, name: StringId) -> Option<HeapId> {
    let mut current = Some(start);
    while let Some(id) = current {
        let s = scope(heap, id);
        if s.kind != ScopeKind::Class && s.vars.contains_key(&name) {
            return Some(id);
        }
        current = s.parent;
    }
    None
}

/// The scope a `def` statement captures: `start` itself, or for a `def` inside a
/// class body, the first enclosing scope that is not a class.
pub(crate) fn capture_scope(heap: &Heap<impl ResourceTracker>, start: HeapId) -> HeapId {
    let mut current = start;
    loop {
        let s = scope(heap, current);
        match s.parent {
            Some(parent) if s.kind == ScopeKind::Class => current = parent,
            _ => return current,
        }
    }
}

/// The nearest enclosing function scope that binds `name`, as `nonlocal` requires.
///
/// Module bindings do not count: `nonlocal` of a global is an error in Python.
pub(crate) fn find_nonlocal(heap: &Heap<impl ResourceTracker>, start: Option<HeapId>, name: StringId) -> Option<HeapId> {
    let mut current = start;
    while let Some(id) = current {
        let s = scope(heap, id);
        if s.kind == ScopeKind::Function && s.vars.contains_key(&name) {
            return Some(id);
        }
        current = s.parent;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        function::Function,
        intern::FunctionId,
        resource::NoLimitTracker,
        types::List,
    };

    fn name(c: u8) -> StringId {
        StringId::from_ascii(c)
    }

    #[test]
    fn lookup_walks_outward_and_reports_unbound() {
        let mut heap = Heap::new(NoLimitTracker);
        let module = enter_scope(&mut heap, None, ScopeKind::Module).unwrap();
        define(&mut heap, module, name(b'g'), Value::Int(1));
        let call = enter_scope(&mut heap, Some(module), ScopeKind::Function).unwrap();
        define(&mut heap, call, name(b'l'), Value::Int(2));

        assert!(matches!(lookup(&heap, call, name(b'g')), Some(Value::Int(1))));
        assert!(matches!(lookup(&heap, call, name(b'l')), Some(Value::Int(2))));
        assert!(lookup(&heap, module, name(b'l')).is_none());
        assert!(lookup(&heap, call, name(b'z')).is_none());
    }

    /// A parameter rebound inside a call leaves the caller's variable untouched.
    #[test]
    fn local_binding_shadows_outer() {
        let mut heap = Heap::new(NoLimitTracker);
        let module = enter_scope(&mut heap, None, ScopeKind::Module).unwrap();
        define(&mut heap, module, name(b'x'), Value::Int(5));
        let call = enter_scope(&mut heap, Some(module), ScopeKind::Function).unwrap();
        define(&mut heap, call, name(b'x'), Value::Int(15));

        assert!(matches!(lookup(&heap, call, name(b'x')), Some(Value::Int(15))));
        assert!(matches!(lookup(&heap, module, name(b'x')), Some(Value::Int(5))));
    }

    #[test]
    fn assign_declares_only_at_module_level() {
        let mut heap = Heap::new(NoLimitTracker);
        let module = enter_scope(&mut heap, None, ScopeKind::Module).unwrap();
        let outer = enter_scope(&mut heap, Some(module), ScopeKind::Function).unwrap();
        define(&mut heap, outer, name(b'n'), Value::Int(0));
        let inner = enter_scope(&mut heap, Some(outer), ScopeKind::Function).unwrap();

        assign(&mut heap, inner, name(b'n'), Value::Int(1)).unwrap();
        assert!(matches!(lookup(&heap, outer, name(b'n')), Some(Value::Int(1))));
        assert!(scope(&heap, inner).get(name(b'n')).is_none());

        assert_eq!(assign(&mut heap, inner, name(b'q'), Value::None), Err(NameUnbound));
        assign(&mut heap, module, name(b'q'), Value::Int(3)).unwrap();
        assert!(matches!(lookup(&heap, inner, name(b'q')), Some(Value::Int(3))));
    }

    #[test]
    fn enclosing_class_scopes_are_skipped() {
        let mut heap = Heap::new(NoLimitTracker);
        let module = enter_scope(&mut heap, None, ScopeKind::Module).unwrap();
        define(&mut heap, module, name(b'v'), Value::Int(1));
        let class_body = enter_scope(&mut heap, Some(module), ScopeKind::Class).unwrap();
        define(&mut heap, class_body, name(b'v'), Value::Int(2));
        let nested = enter_scope(&mut heap, Some(class_body), ScopeKind::Function).unwrap();

        assert!(matches!(lookup(&heap, class_body, name(b'v')), Some(Value::Int(2))));
        assert!(matches!(lookup(&heap, nested, name(b'v')), Some(Value::Int(1))));
        assert_eq!(find_nonlocal(&heap, Some(class_body), name(b'v')), None);
    }

    /// A function keeps its defining scope, and whatever that scope holds, alive
    /// after the frame that created the scope is gone.
    #[test]
    fn captured_scope_outlives_its_frame() {
        let mut heap = Heap::new(NoLimitTracker);
        let module = enter_scope(&mut heap, None, ScopeKind::Module).unwrap();
        let call = enter_scope(&mut heap, Some(module), ScopeKind::Function).unwrap();
        let list = heap.allocate(HeapData::List(List::new(vec![Value::Int(9)]))).unwrap();
        define(&mut heap, call, name(b'x'), Value::Ref(list));
        let inner = heap
            .allocate(HeapData::Function(Function {
                func_id: FunctionId::new(0),
                name: name(b'f'),
                scope: call,
                defaults: Vec::new(),
            }))
            .unwrap();
        define(&mut heap, module, name(b'f'), Value::Ref(inner));

        // the call returns: only the module scope is a root now
        assert_eq!(heap.collect_garbage([module]), 0);
        assert!(heap.is_live(call));
        assert!(heap.is_live(list));

        // dropping the function releases the captured scope and its contents
        define(&mut heap, module, name(b'f'), Value::None);
        assert_eq!(heap.collect_garbage([module]), 3);
        assert!(!heap.is_live(call));
    }
}
