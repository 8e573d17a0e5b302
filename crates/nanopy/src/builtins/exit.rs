//! Implementation of the exit() builtin function.

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult, SimpleException},
    heap::Heap,
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Implementation of the exit() builtin function.
///
/// Raises `SystemExit` carrying the status: `None` and no argument mean 0, an
/// int is used as is, and any other value becomes the message with status 1.
pub fn builtin_exit(heap: &Heap<impl ResourceTracker>, args: ArgValues, interns: &Interns) -> RunResult<Value> {
    args.check_no_kwargs("exit", interns)?;
    args.check_range("exit", 0, 1)?;
    let message = match args.args.first() {
        None | Some(Value::None) => None,
        Some(Value::Bool(flag)) => Some(i32::from(*flag).to_string()),
        Some(Value::Int(code)) => Some(code.to_string()),
        Some(other) => Some(other.py_str(heap, interns).into_owned()),
    };
    Err(SimpleException::new(ExcType::SystemExit, message).into())
}
