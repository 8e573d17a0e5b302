//! Persistent REPL session support.
//!
//! `ReplSession` keeps interpreter state across `execute()` calls so interactive
//! snippets can share variables, functions, classes and heap objects.

use std::time::Instant;

use crate::{
    eval::Evaluator,
    function::FunctionDef,
    heap::{Heap, HeapData, HeapId, HeapStats},
    intern::{InternerBuilder, Interns, StaticStrings},
    io::PrintWriter,
    namespace::{self, ScopeKind},
    object::Object,
    parse,
    repl_error::ReplError,
    resource::{LimitedTracker, ResourceLimits},
    tracer::NoopTracer,
};

/// Stateful REPL session.
///
/// The session owns a long-lived heap, the module scope, the interner state and the
/// accumulated function table. Each `execute()` call parses a new snippet and runs it
/// against the same module scope.
///
/// # Example
/// ```
/// use nanopy::{NoPrint, Object, ReplSession};
///
/// let mut session = ReplSession::new("<stdin>");
/// session.execute("def double(x):\n    return x * 2", &mut NoPrint).unwrap();
/// let result = session.execute("double(21)", &mut NoPrint).unwrap();
/// assert_eq!(result, Object::Int(42));
/// ```
#[derive(Debug)]
pub struct ReplSession {
    /// Append-only interner state shared across snippets.
    interner: InternerBuilder,
    /// Frozen copy of `interner`, refreshed whenever a snippet adds strings.
    interns: Interns,
    /// Every function defined so far, indexed by `FunctionId`.
    functions: Vec<FunctionDef>,
    heap: Heap<LimitedTracker>,
    /// The module scope; the only root between snippets.
    module_scope: HeapId,
    /// Script name used in parse and runtime error reporting.
    script_name: String,
    /// Session start, the zero point for `clock()`.
    started: Instant,
}

impl ReplSession {
    /// Creates a session with the default resource limits.
    #[must_use]
    pub fn new(script_name: &str) -> Self {
        Self::new_with_resource_limits(script_name, ResourceLimits::new())
    }

    /// Creates a session whose limits persist across snippets.
    ///
    /// Allocation and memory limits count over the whole session; time and operation
    /// limits restart with every snippet.
    #[must_use]
    pub fn new_with_resource_limits(script_name: &str, resource_limits: ResourceLimits) -> Self {
        // the scope is allocated before the limits are installed, so it cannot fail
        let mut heap = Heap::new(LimitedTracker::new(ResourceLimits::new()));
        let module_scope = namespace::enter_scope(&mut heap, None, ScopeKind::Module)
            .expect("an unlimited heap rejected the module scope");
        *heap.tracker_mut() = LimitedTracker::new(resource_limits);
        namespace::define(
            &mut heap,
            module_scope,
            StaticStrings::DunderName.into(),
            StaticStrings::DunderMain.into(),
        );
        let interner = InternerBuilder::new("");
        Self {
            interns: Interns::from_builder(&interner),
            interner,
            functions: Vec::new(),
            heap,
            module_scope,
            script_name: script_name.to_owned(),
            started: Instant::now(),
        }
    }

    /// Parses and runs one snippet in the session's module scope.
    ///
    /// Returns the value of the final statement if it is an expression, else `None`.
    /// A parse failure leaves the session untouched; a runtime failure keeps every
    /// binding the snippet made before it failed.
    pub fn execute(&mut self, code: &str, print: &mut impl PrintWriter) -> Result<Object, ReplError> {
        let parsed = parse::parse_with_interner(code, &self.script_name, self.interner.clone(), self.functions.len())
            .map_err(|e| ReplError::Parse(e.into_python_exc(&self.script_name, code)))?;
        self.interner = parsed.interner;
        self.interns = Interns::from_builder(&self.interner);
        self.functions.extend(parsed.functions);

        self.heap.tracker_mut().restart_clock();
        let mut evaluator = Evaluator::new(
            &mut self.heap,
            &self.interns,
            &self.functions,
            print,
            NoopTracer,
            self.module_scope,
            self.started,
        );
        let value = evaluator
            .run_module(&parsed.nodes)
            .map_err(|err| ReplError::from_run(err.into_python_exception(&self.interns, code)))?;
        Ok(Object::new(value, &self.heap, &self.interns))
    }

    /// Returns the script name configured for this session.
    #[must_use]
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    /// Returns a snapshot of the current heap state.
    ///
    /// Useful for watching heap growth across snippets; compare two snapshots with
    /// [`HeapStats::diff`].
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Runs a full collection rooted at the module scope and returns the number of
    /// objects freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.heap.collect_garbage([self.module_scope])
    }

    /// Returns the current value of a global variable, or `None` if it is unbound.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<Object> {
        let name_id = self.interns.try_get_str_id(name)?;
        let value = namespace::lookup(&self.heap, self.module_scope, name_id)?;
        Some(Object::new(value, &self.heap, &self.interns))
    }

    /// Lists the global variables with their type names, sorted by name.
    #[must_use]
    pub fn list_variables(&self) -> Vec<(String, String)> {
        let HeapData::Scope(scope) = self.heap.get(self.module_scope) else {
            return Vec::new();
        };
        let mut vars: Vec<(String, String)> = scope
            .vars()
            .iter()
            .filter(|&(&name, _)| name != StaticStrings::DunderName)
            .map(|(&name, value)| {
                (
                    self.interns.get_str(name).to_owned(),
                    value.type_name(&self.heap, &self.interns).into_owned(),
                )
            })
            .collect();
        vars.sort_unstable_by(|lhs, rhs| lhs.0.cmp(&rhs.0));
        vars
    }
}
