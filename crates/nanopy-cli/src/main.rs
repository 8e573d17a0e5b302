use std::{
    fs,
    io::{self, Write},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use nanopy::{
    EvalTracer, Exception, HeapStats, LimitedTracker, NoopTracer, Object, ProfilingTracer, ReplSession, ResourceLimits,
    Runner, StderrTracer, StdPrint,
};

/// Runs a nanopy program, or starts an interactive session when no file is given.
#[derive(Debug, Parser)]
#[command(name = "nanopy", version, about)]
struct Cli {
    /// Log every executed statement to stderr
    #[arg(long)]
    trace: bool,
    /// Print statement, call and allocation counts after the run
    #[arg(long)]
    profile: bool,
    /// Print heap statistics as JSON on exit
    #[arg(long)]
    heap_stats: bool,
    /// Collect garbage every N statements
    #[arg(long, value_name = "N")]
    gc_interval: Option<usize>,
    /// Fail with MemoryError once the heap holds more than BYTES
    #[arg(long, value_name = "BYTES")]
    max_memory: Option<usize>,
    /// Maximum call depth before RecursionError
    #[arg(long, value_name = "N")]
    max_recursion: Option<usize>,
    /// Program to run
    file: Option<String>,
}

impl Cli {
    fn limits(&self) -> ResourceLimits {
        let mut limits = ResourceLimits::new();
        if let Some(interval) = self.gc_interval {
            limits = limits.gc_interval(interval);
        }
        if let Some(bytes) = self.max_memory {
            limits = limits.max_memory(bytes);
        }
        if let Some(depth) = self.max_recursion {
            limits = limits.max_recursion_depth(Some(depth));
        }
        limits
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match &cli.file {
        Some(file_path) => run_file(file_path, &cli),
        None => run_repl(&cli),
    }
}

fn run_file(file_path: &str, options: &Cli) -> ExitCode {
    let code = match read_file(file_path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let runner = match Runner::new(code, file_path) {
        Ok(runner) => runner,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    let mut profiler = ProfilingTracer::new();
    let (result, stats) = if options.profile {
        run_with(&runner, options, &mut profiler)
    } else if options.trace {
        run_with(&runner, options, StderrTracer::new())
    } else {
        run_with(&runner, options, NoopTracer)
    };
    let elapsed = start.elapsed();

    if options.profile {
        eprintln!("{}", profiler.report());
    }
    if options.heap_stats {
        print_heap_stats(&stats);
    }
    match result {
        Ok(_) => {
            if options.trace || options.profile {
                eprintln!("success after: {elapsed:?}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => match err.exit_code() {
            Some(code) => exit_status(&err, code),
            None => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        },
    }
}

/// `exit()` ends the program quietly; only a message passed to it is printed.
fn exit_status(err: &Exception, code: i32) -> ExitCode {
    if let Some(message) = err.message()
        && message.parse::<i32>().is_err()
    {
        eprintln!("{message}");
    }
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run_with(runner: &Runner, options: &Cli, tracer: impl EvalTracer) -> (Result<Object, Exception>, HeapStats) {
    let tracker = LimitedTracker::new(options.limits());
    runner.run_with_stats(tracker, &mut StdPrint::default(), tracer)
}

fn print_heap_stats(stats: &HeapStats) {
    match serde_json::to_string_pretty(stats) {
        Ok(json) => eprintln!("{json}"),
        Err(err) => eprintln!("error: could not serialize heap stats: {err}"),
    }
}

/// Reads snippets from stdin; a line ending in `:` opens a block that runs once a
/// blank line closes it.
fn run_repl(options: &Cli) -> ExitCode {
    let mut session = ReplSession::new_with_resource_limits("<stdin>", options.limits());
    let mut print = StdPrint::default();
    let mut snippet = String::new();
    loop {
        prompt(if snippet.is_empty() { ">>> " } else { "... " });
        let line = match read_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        };
        let in_block = !snippet.is_empty();
        if in_block && !line.trim().is_empty() {
            snippet.push_str(&line);
            snippet.push('\n');
            continue;
        }
        if !in_block {
            if line.trim().is_empty() {
                continue;
            }
            snippet.push_str(&line);
            snippet.push('\n');
            if line.trim_end().ends_with(':') {
                continue;
            }
        }
        let exit = execute_snippet(&mut session, &snippet, &mut print);
        snippet.clear();
        if let Some(status) = exit {
            return finish_repl(&session, options, status);
        }
    }
    let status = if snippet.is_empty() {
        ExitCode::SUCCESS
    } else {
        execute_snippet(&mut session, &snippet, &mut print).unwrap_or(ExitCode::SUCCESS)
    };
    finish_repl(&session, options, status)
}

fn finish_repl(session: &ReplSession, options: &Cli, status: ExitCode) -> ExitCode {
    if options.heap_stats {
        print_heap_stats(&session.heap_stats());
    }
    status
}

/// Runs one snippet; returns the status to leave with if it called `exit()`.
fn execute_snippet(session: &mut ReplSession, snippet: &str, print: &mut StdPrint) -> Option<ExitCode> {
    match session.execute(snippet, print) {
        Ok(Object::None) => None,
        Ok(value) => {
            println!("{}", value.py_repr());
            None
        }
        Err(err) => match err.exception().exit_code() {
            Some(code) => Some(exit_status(err.exception(), code)),
            None => {
                eprintln!("{err}");
                None
            }
        },
    }
}

/// Reads one line without holding the stdin lock, so `input()` can read too.
fn read_line() -> io::Result<Option<String>> {
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Some(line))
}

fn prompt(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("reading {file_path}: {err}"));
        }
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn limit_flags_build_resource_limits() {
        let cli = Cli::try_parse_from(["nanopy", "--gc-interval", "10", "--max-memory", "4096", "prog.py"]).unwrap();
        assert_eq!(cli.file.as_deref(), Some("prog.py"));
        let limits = cli.limits();
        assert_eq!(limits.gc_interval, Some(10));
        assert_eq!(limits.max_memory, Some(4096));
        assert_eq!(limits.max_recursion_depth, ResourceLimits::new().max_recursion_depth);
    }

    #[test]
    fn no_file_means_repl() {
        let cli = Cli::try_parse_from(["nanopy", "--heap-stats", "--max-recursion", "50"]).unwrap();
        assert!(cli.file.is_none());
        assert!(cli.heap_stats);
        assert_eq!(cli.limits().max_recursion_depth, Some(50));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Cli::try_parse_from(["nanopy", "--max-memory", "lots"]).is_err());
        assert!(Cli::try_parse_from(["nanopy", "--unknown"]).is_err());
        assert!(Cli::try_parse_from(["nanopy", "a.py", "b.py"]).is_err());
    }
}
