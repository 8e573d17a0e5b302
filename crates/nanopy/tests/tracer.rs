//! Tests for the evaluator tracers.

use nanopy::{CollectStringPrint, NoLimitTracker, ProfilingTracer, RecordingTracer, Runner, TraceEvent};
use pretty_assertions::assert_eq;

fn record(code: &str) -> Vec<TraceEvent> {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut tracer = RecordingTracer::new();
    runner
        .run_with_tracer(NoLimitTracker, &mut CollectStringPrint::new(), &mut tracer)
        .unwrap();
    tracer.into_events()
}

fn profile(code: &str) -> nanopy::ProfilingReport {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut tracer = ProfilingTracer::new();
    runner
        .run_with_tracer(NoLimitTracker, &mut CollectStringPrint::new(), &mut tracer)
        .unwrap();
    tracer.report()
}

// =============================================================================
// 1. RecordingTracer
// =============================================================================

/// Statements are reported in execution order, including those inside calls.
#[test]
fn statements_follow_execution_order() {
    let events = record("x = 1\ndef f(a):\n    return a\ny = f(x)\n");
    let statements: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            TraceEvent::Statement { line, kind } => Some((*line, *kind)),
            _ => None,
        })
        .collect();
    assert_eq!(
        statements,
        vec![(1, "Assign"), (2, "FunctionDef"), (4, "Assign"), (3, "Return")]
    );
}

/// Calls and returns pair up with matching depths.
#[test]
fn calls_and_returns_are_paired() {
    let events = record("def inner():\n    return 1\ndef outer():\n    return inner()\nouter()\n");
    let frames: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, TraceEvent::Call { .. } | TraceEvent::Return { .. }))
        .cloned()
        .collect();
    assert_eq!(
        frames,
        vec![
            TraceEvent::Call {
                func_name: "outer".to_owned(),
                depth: 1
            },
            TraceEvent::Call {
                func_name: "inner".to_owned(),
                depth: 2
            },
            TraceEvent::Return { depth: 2 },
            TraceEvent::Return { depth: 1 },
        ]
    );
}

/// Explicit collections are reported with their results.
#[test]
fn collections_are_recorded() {
    let events = record("a = [1]\na = None\ngc_collect()\n");
    let collections: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, TraceEvent::Collect { .. }))
        .collect();
    assert_eq!(collections.len(), 1);
    let TraceEvent::Collect { freed, .. } = collections[0] else {
        unreachable!()
    };
    assert!(*freed >= 1, "the dropped list should be freed");
}

/// A limited recorder stops after its limit.
#[test]
fn recording_limit_caps_events() {
    let runner = Runner::new("for i in range(100):\n    x = i\n".to_owned(), "test.py").unwrap();
    let mut tracer = RecordingTracer::with_limit(10);
    runner
        .run_with_tracer(NoLimitTracker, &mut CollectStringPrint::new(), &mut tracer)
        .unwrap();
    assert_eq!(tracer.events().len(), 10);
}

// =============================================================================
// 2. ProfilingTracer
// =============================================================================

/// The profile counts calls and the deepest frame reached.
#[test]
fn profile_counts_calls_and_depth() {
    let report = profile("def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\nfact(5)\n");
    assert_eq!(report.total_calls, 5);
    assert_eq!(report.max_depth, 5);
}

/// Statement and allocation counts are grouped by kind, most frequent first.
#[test]
fn profile_groups_counts_by_kind() {
    let report = profile("items = []\nfor i in range(3):\n    items.append([i])\n");
    assert_eq!(report.statement_counts.first(), Some(&("Expr", 3)));
    assert!(report.allocation_counts.contains(&("List", 4)), "{:?}", report.allocation_counts);
    assert_eq!(report.total_statements, 5);
    assert!(report.to_string().starts_with("=== nanopy Profiling Report ==="));
}
