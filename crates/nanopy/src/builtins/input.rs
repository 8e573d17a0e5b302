//! Implementation of the input() builtin function.

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunResult, SimpleException},
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    value::Value,
};

/// Implementation of the input() builtin function.
///
/// Writes the optional prompt without a newline, then reads one line from the
/// host's [`PrintWriter`]. Running out of input raises `EOFError`.
pub fn builtin_input<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    args.check_no_kwargs("input", ev.interns)?;
    args.check_range("input", 0, 1)?;
    if let Some(&prompt) = args.args.first() {
        let prompt = prompt.py_str(ev.heap, ev.interns).into_owned();
        ev.print.stdout_write(prompt.into())?;
    }
    match ev.print.stdin_read_line()? {
        Some(line) => ev.alloc_str(line),
        None => Err(SimpleException::new_msg(ExcType::EOFError, "EOF when reading a line").into()),
    }
}
