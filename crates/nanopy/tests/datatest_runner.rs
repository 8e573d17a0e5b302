//! Runs every `test_cases/*.py` program and compares its output with the sibling
//! `.expected` file.
//!
//! Each program runs twice: once with the default collection schedule and once
//! collecting at every statement. Both runs must print exactly the expected output,
//! so a value the collector frees too early shows up as a diff or a crash.

use std::fs;

use datatest_stable::Utf8Path;
use nanopy::{CollectStringPrint, LimitedTracker, ResourceLimits, Runner};

fn run_with_limits(runner: &Runner, limits: ResourceLimits) -> Result<String, String> {
    let mut print = CollectStringPrint::new();
    runner
        .run(LimitedTracker::new(limits), &mut print)
        .map_err(|err| format!("{err}\n--- output before the error ---\n{}", print.output()))?;
    Ok(print.into_output())
}

fn run_test_case(path: &Utf8Path) -> datatest_stable::Result<()> {
    let code = fs::read_to_string(path)?;
    let expected = fs::read_to_string(path.with_extension("expected"))?;
    let script_name = path.file_name().unwrap_or("test.py");
    let runner = Runner::new(code, script_name).map_err(|err| err.to_string())?;

    let schedules = [
        ("default collection", ResourceLimits::new()),
        ("collection at every statement", ResourceLimits::new().gc_interval(1)),
    ];
    for (schedule, limits) in schedules {
        let output = run_with_limits(&runner, limits).map_err(|err| format!("{schedule}: {err}"))?;
        if output != expected {
            let diff = pretty_assertions::StrComparison::new(&expected, &output);
            return Err(format!("{schedule}: output differs from {path}\n{diff}").into());
        }
    }
    Ok(())
}

datatest_stable::harness! {
    { test = run_test_case, root = "tests/test_cases", pattern = r"^.*\.py$" },
}
