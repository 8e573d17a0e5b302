//! Tests for the host-facing builtins: `type()`, `input()`, `exit()` and `time()`.

use nanopy::{CollectStringPrint, ExcType, NoLimitTracker, Object, Runner};
use pretty_assertions::assert_eq;

fn run_with(code: &str, print: &mut CollectStringPrint) -> Result<Object, nanopy::Exception> {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    runner.run(NoLimitTracker, print)
}

fn run_output(code: &str) -> String {
    let mut print = CollectStringPrint::new();
    run_with(code, &mut print).unwrap();
    print.into_output()
}

// =============================================================================
// 1. type()
// =============================================================================

/// Builtin values report their builtin type, which compares equal to the type name.
#[test]
fn type_of_builtin_values() {
    let output = run_output("print(type(1), type('s'), type([]), type(None))\nprint(type(1) == int, type(1.5) == int)");
    assert_eq!(
        output,
        "<class 'int'> <class 'str'> <class 'list'> <class 'NoneType'>\nTrue False\n"
    );
}

/// Instances report their class, so the result can be called or passed to `isinstance`.
#[test]
fn type_of_instance_is_its_class() {
    let code = "
class Dog:
    def __init__(self, name):
        self.name = name

rex = Dog('rex')
twin = type(rex)('twin')
print(type(rex), twin.name, isinstance(twin, Dog), type(rex) == Dog)
";
    assert_eq!(run_output(code), "<class 'Dog'> twin True True\n");
}

/// `type()` takes exactly one argument.
#[test]
fn type_rejects_wrong_arity() {
    let err = run_with("type(1, 2)", &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

// =============================================================================
// 2. input()
// =============================================================================

/// Each call reads the next queued line; the prompt goes to the output without a newline.
#[test]
fn input_reads_queued_lines() {
    let mut print = CollectStringPrint::with_input(["ada", "36"]);
    let code = "name = input('name? ')\nage = int(input())\nprint(name, age + 1)";
    run_with(code, &mut print).unwrap();
    assert_eq!(print.output(), "name? ada 37\n");
}

/// Reading past the last line raises `EOFError`.
#[test]
fn input_past_end_raises_eof_error() {
    let mut print = CollectStringPrint::with_input(["only"]);
    let err = run_with("input()\ninput()", &mut print).unwrap_err();
    assert_eq!(err.summary(), "EOFError: EOF when reading a line");
}

// =============================================================================
// 3. exit()
// =============================================================================

/// `exit()` stops the program at once and carries its status.
#[test]
fn exit_stops_the_program() {
    let mut print = CollectStringPrint::new();
    let err = run_with("print('before')\nexit(3)\nprint('after')", &mut print).unwrap_err();
    assert_eq!(print.output(), "before\n");
    assert_eq!(err.exc_type(), ExcType::SystemExit);
    assert_eq!(err.exit_code(), Some(3));
}

/// No argument means success; a non-integer argument is a message with status 1.
#[test]
fn exit_status_defaults() {
    let err = run_with("exit()", &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.exit_code(), Some(0));
    let err = run_with("exit('bad input')", &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
    assert_eq!(err.message(), Some("bad input"));
}

/// Ordinary errors carry no exit status.
#[test]
fn other_errors_have_no_exit_code() {
    let err = run_with("1 / 0", &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.exit_code(), None);
}

// =============================================================================
// 4. time()
// =============================================================================

/// `time()` is the same clock as `clock()`: seconds since the run started.
#[test]
fn time_is_the_run_clock() {
    let output = run_output("t = time()\nprint(t >= 0.0, clock() >= t, time == clock)");
    assert_eq!(output, "True True True\n");
}
