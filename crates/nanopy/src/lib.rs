#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_wrap, reason = "lengths and indexes never exceed i64::MAX")]
// first so its types are in scope for everything that traces or allocates
mod heap;

mod args;
mod builtins;
mod eval;
mod exception_private;
mod exception_public;
mod expressions;
mod function;
mod intern;
mod io;
mod namespace;
mod object;
mod operators;
mod parse;
mod repl;
mod repl_error;
mod resource;
mod run;
pub mod tracer;
mod types;
mod value;

pub use crate::{
    exception_private::ExcType,
    exception_public::{CodeLoc, Exception, StackFrame},
    heap::{HeapDiff, HeapStats},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    object::{ConversionError, Object},
    repl::ReplSession,
    repl_error::ReplError,
    resource::{
        DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker,
    },
    run::Runner,
    tracer::{EvalTracer, NoopTracer, ProfilingReport, ProfilingTracer, RecordingTracer, StderrTracer, TraceEvent},
};
