//! Tests for `ReplSession`: state carried across snippets, error recovery and
//! heap inspection between snippets.

use nanopy::{CollectStringPrint, ExcType, NoPrint, Object, ReplError, ReplSession, ResourceLimits};
use pretty_assertions::assert_eq;

// =============================================================================
// 1. Persistent State
// =============================================================================

/// Executing a bare expression returns its value; assignments return `None`.
#[test]
fn expression_returns_value() {
    let mut session = ReplSession::new("<stdin>");
    assert_eq!(session.execute("x = 40", &mut NoPrint).unwrap(), Object::None);
    assert_eq!(session.execute("x + 2", &mut NoPrint).unwrap(), Object::Int(42));
}

/// Functions and classes defined in one snippet are callable from later ones.
#[test]
fn definitions_persist_across_snippets() {
    let mut session = ReplSession::new("<stdin>");
    session
        .execute("class Greeter:\n    def greet(self, name):\n        return 'hi ' + name", &mut NoPrint)
        .unwrap();
    session.execute("def make():\n    return Greeter()", &mut NoPrint).unwrap();
    let mut print = CollectStringPrint::new();
    session.execute("print(make().greet('bob'))", &mut print).unwrap();
    assert_eq!(print.output(), "hi bob\n");
}

/// Closures created in one snippet keep working after collections in later ones.
#[test]
fn closures_survive_between_snippets() {
    let mut session = ReplSession::new("<stdin>");
    session
        .execute(
            "def counter():\n    n = [0]\n    def inc():\n        n[0] += 1\n        return n[0]\n    return inc\nc = counter()",
            &mut NoPrint,
        )
        .unwrap();
    session.collect_garbage();
    session.execute("c()", &mut NoPrint).unwrap();
    session.collect_garbage();
    assert_eq!(session.execute("c()", &mut NoPrint).unwrap(), Object::Int(2));
}

/// `get_variable` snapshots a global; unknown names give `None`.
#[test]
fn get_variable_reads_globals() {
    let mut session = ReplSession::new("<stdin>");
    session.execute("data = {'a': [1, 2.5], 'b': None}", &mut NoPrint).unwrap();
    assert_eq!(
        session.get_variable("data"),
        Some(Object::Dict(vec![
            (
                Object::String("a".to_owned()),
                Object::List(vec![Object::Int(1), Object::Float(2.5)])
            ),
            (Object::String("b".to_owned()), Object::None),
        ]))
    );
    assert_eq!(session.get_variable("nothing_here"), None);
}

/// Names first seen in a later snippet are readable, including ones bound just
/// before that snippet failed.
#[test]
fn later_snippet_names_are_readable() {
    let mut session = ReplSession::new("<stdin>");
    session.execute("first = 1", &mut NoPrint).unwrap();
    assert_eq!(session.get_variable("second"), None);
    session.execute("second = first + 1", &mut NoPrint).unwrap();
    assert_eq!(session.get_variable("second"), Some(Object::Int(2)));
    session.execute("third = 'x'
undefined_name", &mut NoPrint).unwrap_err();
    assert_eq!(session.get_variable("third"), Some(Object::String("x".to_owned())));
    let names: Vec<String> = session.list_variables().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["first", "second", "third"]);
}

// =============================================================================
// 2. Error Recovery
// =============================================================================

/// A parse error is reported and leaves the session usable.
#[test]
fn parse_error_leaves_session_intact() {
    let mut session = ReplSession::new("<stdin>");
    session.execute("x = 1", &mut NoPrint).unwrap();
    let err = session.execute("x = (", &mut NoPrint).unwrap_err();
    assert!(matches!(err, ReplError::Parse(_)), "expected a parse error, got {err:?}");
    assert_eq!(session.execute("x", &mut NoPrint).unwrap(), Object::Int(1));
}

/// A runtime error keeps the bindings made before it.
#[test]
fn runtime_error_keeps_earlier_bindings() {
    let mut session = ReplSession::new("<stdin>");
    let err = session.execute("y = 5\nz = y / 0", &mut NoPrint).unwrap_err();
    assert_eq!(err.exception().exc_type(), ExcType::ZeroDivisionError);
    assert!(matches!(err, ReplError::Runtime(_)));
    assert_eq!(session.get_variable("y"), Some(Object::Int(5)));
    assert_eq!(session.get_variable("z"), None);
}

/// Resource failures are reported separately from ordinary runtime errors.
#[test]
fn resource_error_is_classified() {
    let mut session = ReplSession::new_with_resource_limits("<stdin>", ResourceLimits::new().max_operations(100));
    let err = session.execute("while True:\n    pass", &mut NoPrint).unwrap_err();
    assert!(matches!(err, ReplError::Resource(_)), "expected a resource error, got {err:?}");
    // the operation budget restarts with every snippet
    assert_eq!(session.execute("1 + 1", &mut NoPrint).unwrap(), Object::Int(2));
}

/// `exit()` in a snippet is reported as a runtime error carrying its status.
#[test]
fn exit_is_reported_with_status() {
    let mut session = ReplSession::new("<stdin>");
    let err = session.execute("exit(2)", &mut NoPrint).unwrap_err();
    assert!(matches!(err, ReplError::Runtime(_)));
    assert_eq!(err.exception().exit_code(), Some(2));
}

// =============================================================================
// 3. Heap Inspection
// =============================================================================

/// Rebinding the only reference to a structure lets a collection reclaim it.
#[test]
fn collect_garbage_reclaims_unreachable_globals() {
    let mut session = ReplSession::new("<stdin>");
    session
        .execute("big = []\nfor i in range(50):\n    big.append([i])", &mut NoPrint)
        .unwrap();
    session.collect_garbage();
    let before = session.heap_stats();
    session.execute("big = None", &mut NoPrint).unwrap();
    let freed = session.collect_garbage();
    let after = session.heap_stats();
    assert!(freed >= 51, "expected the list and its 50 items to be freed, got {freed}");
    assert_eq!(before.live_objects - after.live_objects, freed);
}

/// `list_variables` reports user globals with their types.
#[test]
fn list_variables_reports_types() {
    let mut session = ReplSession::new("<stdin>");
    session.execute("n = 1\ns = 'text'\ndef f():\n    pass", &mut NoPrint).unwrap();
    let vars = session.list_variables();
    assert!(vars.contains(&("n".to_owned(), "int".to_owned())), "{vars:?}");
    assert!(vars.contains(&("s".to_owned(), "str".to_owned())), "{vars:?}");
    assert!(vars.contains(&("f".to_owned(), "function".to_owned())), "{vars:?}");
    assert!(vars.iter().all(|(name, _)| name != "__name__"), "{vars:?}");
}
