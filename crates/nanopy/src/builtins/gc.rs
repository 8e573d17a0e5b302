//! Collector and timing builtins: gc_collect(), gc_stats() and clock().

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::RunResult,
    heap::HeapData,
    intern::StaticStrings,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    types::Dict,
    value::Value,
};

/// Implementation of the gc_collect() builtin function.
///
/// Runs a full collection immediately and returns the number of objects freed.
/// Every value the calling expression is still using is rooted, so this is safe
/// in the middle of a statement.
pub fn builtin_gc_collect<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    args.check_no_kwargs("gc_collect", ev.interns)?;
    args.check_exact("gc_collect", 0)?;
    let freed = ev.collect_garbage();
    Ok(Value::Int(i64::try_from(freed).unwrap_or(i64::MAX)))
}

/// Implementation of the gc_stats() builtin function.
///
/// Returns `{'allocated_bytes': .., 'next_gc_bytes': .., 'live_objects': .., 'collections': ..}`.
pub fn builtin_gc_stats<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    args.check_no_kwargs("gc_stats", ev.interns)?;
    args.check_exact("gc_stats", 0)?;
    let entries = [
        (StaticStrings::AllocatedBytes, ev.heap.live_bytes()),
        (StaticStrings::NextGcBytes, ev.heap.next_gc_bytes()),
        (StaticStrings::LiveObjects, ev.heap.live_objects()),
        (StaticStrings::Collections, ev.heap.collections()),
    ];
    let mut dict = Dict::new();
    for (key, count) in entries {
        let count = Value::Int(i64::try_from(count).unwrap_or(i64::MAX));
        dict.set(key.into(), count, ev.heap, ev.interns)?;
    }
    ev.allocate(HeapData::Dict(dict))
}

/// Implementation of the clock() builtin function: seconds since the run started.
pub fn builtin_clock<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>(
    ev: &mut Evaluator<'_, T, P, Tr>,
    args: ArgValues,
) -> RunResult<Value> {
    args.check_no_kwargs("clock", ev.interns)?;
    args.check_exact("clock", 0)?;
    Ok(Value::Float(ev.started.elapsed().as_secs_f64()))
}
