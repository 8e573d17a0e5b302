//! Implementation of the isinstance() builtin function.

use crate::{
    args::ArgValues,
    builtins::Builtins,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    types::{Type, class::is_subclass},
    value::Value,
};

/// Implementation of the isinstance() builtin function.
///
/// `classinfo` may be a user class (matched through the single-parent chain), a
/// builtin type such as `int`, or a tuple of either. As in Python, `bool` values
/// are instances of `int`.
pub fn builtin_isinstance(heap: &Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    args.check_no_kwargs("isinstance", interns)?;
    args.check_exact("isinstance", 2)?;
    let (obj, classinfo) = (args.args[0], args.args[1]);
    match isinstance_check(heap, obj, classinfo) {
        Some(result) => Ok(Value::Bool(result)),
        None => Err(ExcType::type_error(
            "isinstance() arg 2 must be a type, a tuple of types, or a union",
        )),
    }
}

/// `None` when `classinfo` is not something isinstance() accepts.
fn isinstance_check(heap: &Heap<impl ResourceTracker>, obj: Value, classinfo: Value) -> Option<bool> {
    match classinfo {
        Value::Builtin(Builtins::Type(ty)) => {
            let obj_type = obj.py_type(heap);
            Some(obj_type == ty || (ty == Type::Int && obj_type == Type::Bool))
        }
        Value::Ref(id) => match heap.get(id) {
            HeapData::Class(_) => Some(match obj {
                Value::Ref(obj_id) => match heap.get(obj_id) {
                    HeapData::Instance(instance) => is_subclass(heap, instance.class, id),
                    _ => false,
                },
                _ => false,
            }),
            HeapData::Tuple(tuple) => {
                let mut found = false;
                for &info in tuple.as_slice() {
                    found |= isinstance_check(heap, obj, info)?;
                }
                Some(found)
            }
            _ => None,
        },
        _ => None,
    }
}
