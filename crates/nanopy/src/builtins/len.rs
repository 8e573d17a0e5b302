//! Implementation of the len() builtin function.

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Implementation of the len() builtin function.
///
/// String lengths count characters, not bytes.
pub fn builtin_len(heap: &Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let value = args.get_one_arg("len", interns)?;
    let len = if let Some(s) = value.as_str(heap, interns) {
        Some(s.chars().count())
    } else if let Value::Ref(id) = value {
        match heap.get(id) {
            HeapData::List(list) => Some(list.len()),
            HeapData::Tuple(tuple) => Some(tuple.len()),
            HeapData::Set(set) => Some(set.len()),
            HeapData::Dict(dict) => Some(dict.len()),
            HeapData::Range(range) => Some(range.len()),
            _ => None,
        }
    } else {
        None
    };
    match len {
        Some(len) => i64::try_from(len).map(Value::Int).map_err(|_| ExcType::overflow()),
        None => Err(ExcType::type_error(format!(
            "object of type '{}' has no len()",
            value.type_name(heap, interns)
        ))),
    }
}
