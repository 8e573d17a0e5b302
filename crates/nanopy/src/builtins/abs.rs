//! Implementation of the abs() builtin function.

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    heap::Heap,
    intern::Interns,
    resource::ResourceTracker,
    value::{Number, Value},
};

/// Implementation of the abs() builtin function.
///
/// `abs(i64::MIN)` has no `i64` result and raises `OverflowError`.
pub fn builtin_abs(heap: &Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    let value = args.get_one_arg("abs", interns)?;
    match value.as_number() {
        Some(Number::Int(n)) => n.checked_abs().map(Value::Int).ok_or_else(ExcType::overflow),
        Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
        None => Err(ExcType::type_error(format!(
            "bad operand type for abs(): '{}'",
            value.type_name(heap, interns)
        ))),
    }
}
