//! Tests for classes: instantiation, attributes, single inheritance and method dispatch.

use nanopy::{CollectStringPrint, ExcType, NoLimitTracker, Runner};
use pretty_assertions::assert_eq;

fn run(code: &str) -> String {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut print = CollectStringPrint::new();
    runner.run(NoLimitTracker, &mut print).unwrap();
    print.into_output()
}

fn run_err(code: &str) -> nanopy::Exception {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    runner.run(NoLimitTracker, &mut CollectStringPrint::new()).unwrap_err()
}

const ANIMALS: &str = r#"
class Animal:
    def __init__(self, name):
        self.name = name

    def speak(self):
        print("Animal speaks")

    def describe(self):
        self.speak()

class Dog(Animal):
    def speak(self):
        print(self.name + " says: Woof!")
"#;

// =============================================================================
// 1. Dispatch
// =============================================================================

/// A subclass override wins over the parent's method.
#[test]
fn override_is_dispatched() {
    let output = run(&format!("{ANIMALS}\nDog('Buddy').speak()\nAnimal('Generic').speak()\n"));
    assert_eq!(output, "Buddy says: Woof!\nAnimal speaks\n");
}

/// A method inherited from the parent still dispatches on the runtime class of `self`.
#[test]
fn inherited_method_dispatches_dynamically() {
    let output = run(&format!("{ANIMALS}\nDog('Rex').describe()\n"));
    assert_eq!(output, "Rex says: Woof!\n");
}

/// `__init__` is looked up through the parent chain.
#[test]
fn init_is_inherited() {
    let output = run(&format!("{ANIMALS}\nd = Dog('Max')\nprint(d.name)\n"));
    assert_eq!(output, "Max\n");
}

/// A method fetched as an attribute stays bound to its instance.
#[test]
fn bound_method_remembers_instance() {
    let output = run(&format!("{ANIMALS}\nspeak = Dog('Fido').speak\ngc_collect()\nspeak()\n"));
    assert_eq!(output, "Fido says: Woof!\n");
}

/// `isinstance` follows the inheritance chain.
#[test]
fn isinstance_follows_parent_chain() {
    let output = run(&format!(
        "{ANIMALS}\nd = Dog('a')\nprint(isinstance(d, Dog), isinstance(d, Animal), isinstance(Animal('b'), Dog))\n"
    ));
    assert_eq!(output, "True True False\n");
}

// =============================================================================
// 2. Attributes
// =============================================================================

/// Instance attributes are per instance; class attributes are shared and shadowable.
#[test]
fn instance_and_class_attributes() {
    let output = run(r"
class Counter:
    start = 100
    def __init__(self):
        self.count = 0
    def increment(self):
        self.count += 1

a = Counter()
b = Counter()
a.increment()
a.increment()
b.increment()
b.start = 5
print(a.count, b.count, a.start, b.start, Counter.start)
");
    assert_eq!(output, "2 1 100 5 100\n");
}

/// Two instances may refer to each other through attributes.
#[test]
fn instances_may_reference_each_other() {
    let output = run(r"
class Node:
    def __init__(self, value):
        self.value = value
        self.next = None

a = Node(1)
b = Node(2)
a.next = b
b.next = a
gc_collect()
print(a.next.next.value, b.next.value)
");
    assert_eq!(output, "1 1\n");
}

// =============================================================================
// 3. Errors
// =============================================================================

/// A missing attribute names the class of the instance.
#[test]
fn missing_attribute_raises_attribute_error() {
    let err = run_err(&format!("{ANIMALS}\nDog('x').fly()\n"));
    assert_eq!(err.exc_type(), ExcType::AttributeError);
    assert_eq!(err.message(), Some("'Dog' object has no attribute 'fly'"));
}

/// Passing the wrong number of arguments to `__init__` is a `TypeError`.
#[test]
fn wrong_constructor_arity_raises_type_error() {
    let err = run_err(&format!("{ANIMALS}\nDog()\n"));
    assert_eq!(err.exc_type(), ExcType::TypeError);
}

/// Only a class can be used as a base class.
#[test]
fn non_class_base_raises_type_error() {
    let err = run_err("base = 1\nclass A(base):\n    pass\n");
    assert_eq!(err.exc_type(), ExcType::TypeError);
}
