//! Implementation of the type() builtin function.

use crate::{
    args::ArgValues,
    builtins::Builtins,
    exception_private::RunResult,
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Implementation of the type() builtin function.
///
/// Instances give back their class object; every other value gives the builtin
/// type it belongs to, so `type(1) == int` holds.
pub fn builtin_type(heap: &Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let value = args.get_one_arg("type", interns)?;
    if let Value::Ref(id) = value
        && let HeapData::Instance(instance) = heap.get(id)
    {
        return Ok(Value::Ref(instance.class));
    }
    Ok(Value::Builtin(Builtins::Type(value.py_type(heap))))
}
