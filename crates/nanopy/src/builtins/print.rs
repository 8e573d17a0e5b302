//! Implementation of the print() builtin function.

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunResult},
    intern::StaticStrings,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    value::Value,
};

/// Implementation of the print() builtin function.
///
/// Supports the following keyword arguments:
/// - `sep`: separator between values (default: " ")
/// - `end`: string appended after the last value (default: "\n")
///
/// The whole line is formatted before anything is written, so an error in a
/// keyword argument prints nothing.
pub fn builtin_print<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    let mut sep = None;
    let mut end = None;
    for &(key, value) in &args.kwargs {
        let slot = match StaticStrings::from_string_id(key) {
            Some(StaticStrings::Sep) => &mut sep,
            Some(StaticStrings::End) => &mut end,
            _ => {
                return Err(ExcType::type_error(format!(
                    "'{}' is an invalid keyword argument for print()",
                    ev.interns.get_str(key)
                )));
            }
        };
        *slot = match value {
            Value::None => None,
            other => match other.as_str(ev.heap, ev.interns) {
                Some(s) => Some(s.to_owned()),
                None => {
                    return Err(ExcType::type_error(format!(
                        "{} must be None or a string, not {}",
                        ev.interns.get_str(key),
                        other.type_name(ev.heap, ev.interns)
                    )));
                }
            },
        };
    }

    let mut output = String::new();
    for (i, value) in args.args.iter().enumerate() {
        if i > 0 {
            output.push_str(sep.as_deref().unwrap_or(" "));
        }
        output.push_str(&value.py_str(ev.heap, ev.interns));
    }
    output.push_str(end.as_deref().unwrap_or("\n"));
    ev.print.stdout_write(output.into())?;
    Ok(Value::None)
}
