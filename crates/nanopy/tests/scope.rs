//! Tests for name resolution through the scope chain: locals, closures,
//! `global` and `nonlocal`.

use nanopy::{CollectStringPrint, ExcType, NoLimitTracker, Object, Runner};
use pretty_assertions::assert_eq;

fn run(code: &str) -> (Object, String) {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut print = CollectStringPrint::new();
    let result = runner.run(NoLimitTracker, &mut print).unwrap();
    (result, print.into_output())
}

// =============================================================================
// 1. Local Bindings
// =============================================================================

/// Rebinding a parameter inside a function leaves the caller's variable alone.
#[test]
fn parameter_rebinding_is_local() {
    let (_, output) = run(r"
def modify_param(x):
    x = x + 10
    return x

value = 5
result = modify_param(value)
print(value, result)
");
    assert_eq!(output, "5 15\n");
}

/// Assigning inside a function creates a local that shadows the global.
#[test]
fn assignment_in_function_shadows_global() {
    let (result, output) = run(r"
x = 'global'
def f():
    x = 'local'
    print(x)
f()
x
");
    assert_eq!(output, "local\n");
    assert_eq!(result, Object::String("global".to_owned()));
}

/// `a = b = c = 10` binds every target to the same value.
#[test]
fn chained_assignment_binds_all_names() {
    let (result, _) = run("a = b = c = 10\n(a, b, c)");
    assert_eq!(
        result,
        Object::Tuple(vec![Object::Int(10), Object::Int(10), Object::Int(10)])
    );
}

/// A chain may mix names, attributes and items; the value is evaluated once.
#[test]
fn chained_assignment_mixes_target_kinds() {
    let (_, output) = run(r"
class Holder:
    pass

calls = [0]
def make():
    calls[0] += 1
    return [calls[0]]

h = Holder()
slots = [None, None]
first = h.value = slots[1] = make()
first.append(2)
print(calls[0], h.value, slots, h.value is slots[1])
");
    assert_eq!(output, "1 [1, 2] [None, [1, 2]] True\n");
}

/// An annotated assignment binds like a plain one.
#[test]
fn annotated_assignment_binds_name() {
    let (result, _) = run("count: int = 5\ncount + 1");
    assert_eq!(result, Object::Int(6));
}

// =============================================================================
// 2. Closures
// =============================================================================

/// A nested function reads enclosing locals even after the enclosing call returned.
#[test]
fn closure_reads_enclosing_local() {
    let (_, output) = run(r"
def outer():
    message = 'hello from outer'
    def inner():
        return message
    return inner

fn = outer()
print(fn())
");
    assert_eq!(output, "hello from outer\n");
}

/// Each call gets a fresh scope, so closures from different calls are independent.
#[test]
fn each_call_captures_its_own_scope() {
    let (_, output) = run(r"
def make_adder(n):
    def add(x):
        return x + n
    return add

add2 = make_adder(2)
add10 = make_adder(10)
print(add2(1), add10(1))
");
    assert_eq!(output, "3 11\n");
}

/// `nonlocal` rebinds the variable in the enclosing function scope.
#[test]
fn nonlocal_rebinds_enclosing_variable() {
    let (_, output) = run(r"
def counter():
    count = 0
    def increment():
        nonlocal count
        count += 1
        return count
    return increment

c = counter()
c()
c()
print(c())
");
    assert_eq!(output, "3\n");
}

/// `global` rebinds the module-level variable from inside a function.
#[test]
fn global_rebinds_module_variable() {
    let (result, _) = run(r"
total = 0
def add(n):
    global total
    total = total + n
add(3)
add(4)
total
");
    assert_eq!(result, Object::Int(7));
}

/// Recursive functions find themselves through the module scope.
#[test]
fn recursion_resolves_through_module_scope() {
    let (result, _) = run(r"
def factorial(n):
    if n <= 1:
        return 1
    return n * factorial(n - 1)
factorial(10)
");
    assert_eq!(result, Object::Int(3_628_800));
}

// =============================================================================
// 3. Unbound Names
// =============================================================================

/// Reading a name no scope binds raises `NameError` with a traceback through the call.
#[test]
fn unbound_name_raises_name_error() {
    let runner = Runner::new("def f():\n    return missing\nf()".to_owned(), "test.py").unwrap();
    let err = runner.run(NoLimitTracker, &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::NameError);
    assert_eq!(err.message(), Some("name 'missing' is not defined"));
    let frames: Vec<_> = err
        .traceback()
        .iter()
        .map(|frame| (frame.frame_name.clone(), frame.start.line))
        .collect();
    assert_eq!(
        frames,
        vec![(Some("<module>".to_owned()), 3), (Some("f".to_owned()), 2)]
    );
}

/// Class attributes are not in scope for the bare names of a method body.
#[test]
fn method_body_does_not_see_class_names() {
    let runner = Runner::new(
        r"
class A:
    value = 1
    def get(self):
        return value
A().get()
"
        .to_owned(),
        "test.py",
    )
    .unwrap();
    let err = runner.run(NoLimitTracker, &mut CollectStringPrint::new()).unwrap_err();
    assert_eq!(err.summary(), "NameError: name 'value' is not defined");
}
