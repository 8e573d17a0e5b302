//! Tests for the garbage collector as seen from running programs.
//!
//! Programs observe the collector through the `gc_collect()` and `gc_stats()`
//! builtins; the host observes it through the `HeapStats` returned by
//! `Runner::run_with_stats`.

use nanopy::{CollectStringPrint, LimitedTracker, NoLimitTracker, NoopTracer, ResourceLimits, Runner};
use pretty_assertions::assert_eq;

fn run(code: &str) -> String {
    let runner = Runner::new(code.to_owned(), "test.py").unwrap();
    let mut print = CollectStringPrint::new();
    runner.run(NoLimitTracker, &mut print).unwrap();
    print.into_output()
}

// =============================================================================
// 1. Cycle Reclamation
// =============================================================================

/// Two instances referencing each other with no outside reference are freed together.
#[test]
fn instance_cycle_is_reclaimed() {
    let output = run(r"
class Node:
    def __init__(self):
        self.other = None

def make_cycle():
    a = Node()
    b = Node()
    a.other = b
    b.other = a

gc_collect()
before = gc_stats()['live_objects']
make_cycle()
gc_collect()
after = gc_stats()['live_objects']
print(after - before)
");
    assert_eq!(output, "0\n");
}

/// A list that contains itself is reclaimed once the name bound to it is rebound.
#[test]
fn self_referencing_list_is_reclaimed() {
    let output = run(r"
gc_collect()
before = gc_stats()['live_objects']
items = [1, 2]
items.append(items)
items = None
gc_collect()
print(gc_stats()['live_objects'] - before)
");
    assert_eq!(output, "0\n");
}

/// A chained assignment leaves nothing behind once its targets are rebound.
#[test]
fn chained_assignment_value_is_reclaimed() {
    let output = run(r"
class Box:
    pass

gc_collect()
before = gc_stats()['live_objects']
a = b = [1, 2, 3]
box = Box()
box.item = items = [a]
a = b = None
box = items = None
gc_collect()
print(gc_stats()['live_objects'] - before)
");
    assert_eq!(output, "0\n");
}

/// A closure stored on an instance that captures a list holding the instance
/// forms an instance -> function -> scope -> list -> instance cycle.
#[test]
fn cycle_through_closure_scope_is_reclaimed() {
    let output = run(r"
class Holder:
    pass

def build():
    holder = Holder()
    items = [holder]
    def get():
        return items
    holder.get = get

gc_collect()
before = gc_stats()['live_objects']
build()
freed = gc_collect()
print(freed > 0, gc_stats()['live_objects'] - before)
");
    assert_eq!(output, "True 0\n");
}

// =============================================================================
// 2. Reachability
// =============================================================================

/// Everything reachable from a global survives any number of collections.
#[test]
fn reachable_objects_survive_collection() {
    let output = run(r"
data = {'xs': [1, 2, 3], 'name': 'a' + 'bc'}
for i in range(5):
    gc_collect()
print(data)
");
    assert_eq!(output, "{'xs': [1, 2, 3], 'name': 'abc'}\n");
}

/// Collecting in the middle of an expression keeps the operands already evaluated.
#[test]
fn collection_mid_expression_keeps_temporaries() {
    let output = run(r"
def make():
    return [1, 2]

print([make(), gc_collect() * 0, make() + [3]])
print(make() + [gc_collect() * 0] + make())
");
    assert_eq!(output, "[[1, 2], 0, [1, 2, 3]]\n[1, 2, 0, 1, 2]\n");
}

/// A closure keeps its defining scope alive after the defining call returns.
#[test]
fn closure_scope_outlives_call() {
    let output = run(r"
def make_counter():
    counts = [0]
    def increment():
        counts[0] = counts[0] + 1
        return counts[0]
    return increment

counter = make_counter()
gc_collect()
counter()
gc_collect()
print(counter())
");
    assert_eq!(output, "2\n");
}

// =============================================================================
// 3. Allocation Churn
// =============================================================================

/// Short-lived allocations in a loop are reclaimed as the loop runs, so the live
/// heap stays small however many iterations there are.
#[test]
fn churn_keeps_live_heap_bounded() {
    let runner = Runner::new(
        r"
for i in range(1000):
    tmp = [i, i + 1, {'k': str(i)}]
"
        .to_owned(),
        "churn.py",
    )
    .unwrap();
    let tracker = LimitedTracker::new(ResourceLimits::new().gc_interval(50));
    let (result, stats) = runner.run_with_stats(tracker, &mut CollectStringPrint::new(), NoopTracer);
    result.unwrap();
    assert!(stats.collections > 10, "expected regular collections, got {}", stats.collections);
    assert!(stats.live_objects < 200, "live heap grew to {} objects", stats.live_objects);
    assert!(stats.total_freed > 2000, "only {} objects were freed", stats.total_freed);
}

/// Without an allocation interval the byte threshold alone triggers collections.
#[test]
fn byte_threshold_triggers_collection() {
    let runner = Runner::new(
        r"
for i in range(20000):
    tmp = [i, i, i, i, i, i, i, i]
"
        .to_owned(),
        "threshold.py",
    )
    .unwrap();
    let (result, stats) = runner.run_with_stats(NoLimitTracker, &mut CollectStringPrint::new(), NoopTracer);
    result.unwrap();
    assert!(stats.collections > 0, "the byte threshold never triggered a collection");
    assert!(stats.live_objects < 20000);
}

/// Lists that grow through `append` count their growth towards the byte threshold.
#[test]
fn container_growth_triggers_collection() {
    let runner = Runner::new(
        r"
for i in range(300):
    tmp = []
    for j in range(1000):
        tmp.append(j)
"
        .to_owned(),
        "growth.py",
    )
    .unwrap();
    let (result, stats) = runner.run_with_stats(NoLimitTracker, &mut CollectStringPrint::new(), NoopTracer);
    result.unwrap();
    assert!(stats.collections >= 5, "growth only triggered {} collections", stats.collections);
    assert!(stats.live_bytes < 400_000, "live bytes grew to {}", stats.live_bytes);
}

/// Collecting at every statement produces the same output as the default schedule.
#[test]
fn collecting_every_statement_changes_nothing() {
    let code = r"
class Animal:
    def __init__(self, name):
        self.name = name
    def speak(self):
        return self.name + ' speaks'

class Dog(Animal):
    def speak(self):
        return self.name + ' says: Woof!'

pets = []
for i in range(10):
    pets.append(Dog('dog' + str(i)) if i % 2 == 0 else Animal('cat' + str(i)))
for p in pets:
    print(p.speak())
";
    let runner = Runner::new(code.to_owned(), "pets.py").unwrap();
    let mut default_print = CollectStringPrint::new();
    runner.run(NoLimitTracker, &mut default_print).unwrap();
    let mut eager_print = CollectStringPrint::new();
    let eager = LimitedTracker::new(ResourceLimits::new().gc_interval(1));
    runner.run(eager, &mut eager_print).unwrap();
    assert_eq!(eager_print.output(), default_print.output());
}
