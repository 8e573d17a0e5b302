//! Tests for heap statistics snapshots and diffs.

use nanopy::{CollectStringPrint, LimitedTracker, NoLimitTracker, NoPrint, NoopTracer, ReplSession, ResourceLimits, Runner};
use pretty_assertions::assert_eq;

/// Statistics taken at exit count what the module scope still reaches.
#[test]
fn stats_count_live_objects_by_type() {
    let runner = Runner::new("a = [1, 2]\nb = {'key': a}\nc = (a, b)\n".to_owned(), "test.py").unwrap();
    let (result, stats) = runner.run_with_stats(NoLimitTracker, &mut CollectStringPrint::new(), NoopTracer);
    result.unwrap();
    assert_eq!(stats.objects_by_type.get("List"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Dict"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Tuple"), Some(&1));
    assert_eq!(stats.objects_by_type.get("Scope"), Some(&1));
    assert_eq!(stats.live_objects, stats.objects_by_type.values().sum::<usize>());
    assert_eq!(stats.tracker_allocations, None);
}

/// A limited tracker also reports its own allocation and memory counters.
#[test]
fn limited_tracker_reports_counters() {
    let runner = Runner::new("x = [1]\ny = [2]\n".to_owned(), "test.py").unwrap();
    let (result, stats) = runner.run_with_stats(
        LimitedTracker::new(ResourceLimits::new()),
        &mut CollectStringPrint::new(),
        NoopTracer,
    );
    result.unwrap();
    assert_eq!(stats.tracker_allocations, Some(3));
    assert!(stats.tracker_memory_bytes.is_some_and(|bytes| bytes > 0));
}

/// Statistics are still returned when the program fails.
#[test]
fn stats_survive_a_failed_run() {
    let runner = Runner::new("keep = [1]\n1 / 0\n".to_owned(), "test.py").unwrap();
    let (result, stats) = runner.run_with_stats(NoLimitTracker, &mut CollectStringPrint::new(), NoopTracer);
    assert!(result.is_err());
    assert_eq!(stats.objects_by_type.get("List"), Some(&1));
}

/// Diffing two session snapshots shows what a snippet left behind.
#[test]
fn diff_between_snippets() {
    let mut session = ReplSession::new("<stdin>");
    let before = session.heap_stats();
    session
        .execute("class P:\n    pass\nitems = [P(), P()]", &mut NoPrint)
        .unwrap();
    // drops the scope the class body ran in
    session.collect_garbage();
    let after = session.heap_stats();
    let diff = before.diff(&after);
    assert_eq!(diff.live_objects_delta, 4);
    assert_eq!(diff.objects_by_type_delta.get("Instance"), Some(&2));
    assert_eq!(diff.new_types, vec!["Class", "Instance", "List"]);
    assert_eq!(diff.collections_delta, 1);
    assert!(diff.removed_types.is_empty());
}

/// A collection with nothing unreachable leaves an empty diff apart from the counter.
#[test]
fn collecting_a_clean_heap_frees_nothing() {
    let mut session = ReplSession::new("<stdin>");
    session.execute("x = [1, 2, 3]", &mut NoPrint).unwrap();
    session.collect_garbage();
    let before = session.heap_stats();
    assert_eq!(session.collect_garbage(), 0);
    let diff = before.diff(&session.heap_stats());
    assert_eq!(diff.live_objects_delta, 0);
    assert_eq!(diff.collections_delta, 1);
}
