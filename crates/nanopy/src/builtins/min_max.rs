//! Implementation of the min() and max() builtin functions.

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::{ExcType, RunResult, SimpleException},
    expressions::CmpOperator,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    value::Value,
};

/// Implementation of the min() builtin function.
///
/// Supports two forms:
/// - `min(iterable)` - returns smallest item from iterable
/// - `min(arg1, arg2, ...)` - returns smallest of the arguments
pub fn builtin_min<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    builtin_min_max(ev, args, true)
}

/// Implementation of the max() builtin function.
///
/// Supports two forms:
/// - `max(iterable)` - returns largest item from iterable
/// - `max(arg1, arg2, ...)` - returns largest of the arguments
pub fn builtin_max<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    builtin_min_max(ev, args, false)
}

/// Ties keep the first item seen, as in Python.
fn builtin_min_max<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
    is_min: bool,
) -> RunResult<Value> {
    let name = if is_min { "min" } else { "max" };
    args.check_no_kwargs(name, ev.interns)?;
    args.check_range(name, 1, usize::MAX)?;

    let items = if args.args.len() == 1 {
        ev.collect_iterable(args.args[0])?
    } else {
        args.args.to_vec()
    };
    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return Err(SimpleException::new_msg(ExcType::ValueError, format!("{name}() iterable argument is empty")).into());
    };
    let op = if is_min { CmpOperator::Lt } else { CmpOperator::Gt };
    for item in items {
        if ev.compare(item, op, best)? {
            best = item;
        }
    }
    Ok(best)
}
