//! Tests for `LimitedTracker`: memory, allocation, operation and recursion limits.

use std::time::Duration;

use nanopy::{CollectStringPrint, ExcType, LimitedTracker, NoLimitTracker, ResourceLimits, Runner};

fn run_limited(code: &str, limits: ResourceLimits) -> Result<String, nanopy::Exception> {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut print = CollectStringPrint::new();
    runner.run(LimitedTracker::new(limits), &mut print)?;
    Ok(print.into_output())
}

/// Growing a reachable structure past the memory limit raises `MemoryError`.
#[test]
fn memory_limit_stops_unbounded_growth() {
    let err = run_limited(
        "keep = []\nwhile True:\n    keep.append([1, 2, 3, 4, 5, 6, 7, 8])\n",
        ResourceLimits::new().max_memory(64 * 1024),
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

/// Growing one list in place is held to the memory limit too.
#[test]
fn memory_limit_stops_append_loop() {
    let err = run_limited(
        "keep = []\nwhile True:\n    keep.append(1)\n",
        ResourceLimits::new().max_memory(64 * 1024),
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

/// Adding keys to a dict is charged like any other growth.
#[test]
fn memory_limit_stops_dict_growth() {
    let err = run_limited(
        "d = {}\ni = 0\nwhile True:\n    d[i] = i\n    i += 1\n",
        ResourceLimits::new().max_memory(64 * 1024),
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

/// Freed objects give their bytes back, so churn runs fine under a small memory
/// limit as long as collections keep up.
#[test]
fn memory_limit_counts_live_bytes_only() {
    let output = run_limited(
        "for i in range(5000):\n    tmp = [i, i, i, i]\nprint('done')\n",
        ResourceLimits::new().max_memory(64 * 1024).gc_interval(20),
    )
    .unwrap();
    assert_eq!(output, "done\n");
}

/// The allocation limit counts every allocation, freed or not.
#[test]
fn allocation_limit() {
    let err = run_limited(
        "for i in range(100):\n    tmp = [i]\n",
        ResourceLimits::new().max_allocations(50),
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

/// An infinite loop is stopped by the operation limit.
#[test]
fn operation_limit_stops_infinite_loop() {
    let err = run_limited("while True:\n    pass\n", ResourceLimits::new().max_operations(1000)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TimeoutError);
}

/// An infinite loop is stopped by the time limit.
#[test]
fn time_limit_stops_infinite_loop() {
    let err = run_limited(
        "x = 0\nwhile True:\n    x += 1\n",
        ResourceLimits::new().max_duration(Duration::from_millis(50)),
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TimeoutError);
}

/// Recursion deeper than the configured limit raises `RecursionError`.
#[test]
fn recursion_limit() {
    let code = "def down(n):\n    return down(n + 1)\ndown(0)\n";
    let err = run_limited(code, ResourceLimits::new().max_recursion_depth(Some(50))).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::RecursionError);
    assert_eq!(err.message(), Some("maximum recursion depth exceeded"));
}

/// The default recursion limit still allows reasonably deep recursion.
#[test]
fn default_recursion_limit_allows_deep_recursion() {
    let code = "def depth(n):\n    if n == 0:\n        return 0\n    return 1 + depth(n - 1)\nprint(depth(900))\n";
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut print = CollectStringPrint::new();
    runner.run(NoLimitTracker, &mut print).unwrap();
    assert_eq!(print.output(), "900\n");
}

/// Repeating a sequence to a huge size is refused before the memory is used.
#[test]
fn large_repeat_is_refused() {
    let err = run_limited("x = 'ab' * 100000000\n", ResourceLimits::new().max_memory(1024 * 1024)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}
