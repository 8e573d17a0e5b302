//! Implementation of the sum() builtin function.

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunResult},
    expressions::Operator,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    types::Type,
    value::Value,
};

/// Implementation of the sum() builtin function.
///
/// Sums the items of an iterable from left to right with an optional start value.
/// The default start value is 0. String start values are rejected, as in Python.
pub fn builtin_sum<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    args.check_no_kwargs("sum", ev.interns)?;
    args.check_range("sum", 1, 2)?;
    let mut accumulator = args.args.get(1).copied().unwrap_or(Value::Int(0));
    if accumulator.py_type(ev.heap) == Type::Str {
        return Err(ExcType::type_error("sum() can't sum strings [use ''.join(seq) instead]"));
    }
    let items = ev.collect_iterable(args.args[0])?;
    for item in items {
        accumulator = ev.binary_op(accumulator, Operator::Add, item)?;
    }
    Ok(accumulator)
}
