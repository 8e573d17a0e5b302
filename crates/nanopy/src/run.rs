//! Public interface for running NanoPython code.
use std::time::Instant;

use crate::{
    Exception,
    eval::Evaluator,
    expressions::StmtLoc,
    function::FunctionDef,
    heap::{Heap, HeapStats},
    intern::{Interns, StaticStrings},
    io::{PrintWriter, StdPrint},
    namespace::{self, ScopeKind},
    object::Object,
    parse::parse,
    resource::{NoLimitTracker, ResourceTracker},
    tracer::{EvalTracer, NoopTracer},
};

/// Primary interface for running NanoPython code.
///
/// Parsing happens once in [`Runner::new`]; every `run*` call then executes the
/// program from scratch against a fresh heap and module scope.
///
/// # Example
/// ```
/// use nanopy::{CollectStringPrint, NoLimitTracker, Object, Runner};
///
/// let runner = Runner::new("a = 10\nb = 5\nprint(a + b * 2)\na - b".to_owned(), "test.py").unwrap();
/// let mut print = CollectStringPrint::new();
/// let result = runner.run(NoLimitTracker, &mut print).unwrap();
/// assert_eq!(print.output(), "20\n");
/// assert_eq!(result, Object::Int(5));
/// ```
#[derive(Debug, Clone)]
pub struct Runner {
    code: String,
    nodes: Vec<StmtLoc>,
    functions: Vec<FunctionDef>,
    interns: Interns,
}

impl Runner {
    /// Parses `code`; `script_name` is the filename shown in tracebacks.
    ///
    /// # Errors
    /// Returns a `SyntaxError` or `NotImplementedError` exception if the code cannot be parsed.
    pub fn new(code: String, script_name: &str) -> Result<Self, Exception> {
        let parsed = parse(&code, script_name).map_err(|e| e.into_python_exc(script_name, &code))?;
        Ok(Self {
            nodes: parsed.nodes,
            functions: parsed.functions,
            interns: Interns::new(parsed.interner),
            code,
        })
    }

    /// Returns the code that was parsed to create this runner.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Runs the program to completion.
    ///
    /// Returns the value of the last statement when it is an expression, else `None`.
    ///
    /// # Arguments
    /// * `resource_tracker` - Custom resource tracker implementation
    /// * `print` - Writer for `print()` output
    pub fn run(&self, resource_tracker: impl ResourceTracker, print: &mut impl PrintWriter) -> Result<Object, Exception> {
        self.execute(resource_tracker, print, NoopTracer).0
    }

    /// Runs the program while reporting evaluator events to `tracer`.
    ///
    /// Pass `&mut tracer` to inspect a [`ProfilingTracer`](crate::ProfilingTracer) or
    /// [`RecordingTracer`](crate::RecordingTracer) afterwards.
    pub fn run_with_tracer(
        &self,
        resource_tracker: impl ResourceTracker,
        print: &mut impl PrintWriter,
        tracer: impl EvalTracer,
    ) -> Result<Object, Exception> {
        self.execute(resource_tracker, print, tracer).0
    }

    /// Runs the program and also returns the heap statistics at exit.
    ///
    /// The statistics are taken whether or not the run succeeded; the module scope
    /// and everything it reaches is still live at that point.
    pub fn run_with_stats(
        &self,
        resource_tracker: impl ResourceTracker,
        print: &mut impl PrintWriter,
        tracer: impl EvalTracer,
    ) -> (Result<Object, Exception>, HeapStats) {
        self.execute(resource_tracker, print, tracer)
    }

    /// Runs the program with no resource limits, printing to stdout.
    pub fn run_no_limits(&self) -> Result<Object, Exception> {
        self.run(NoLimitTracker, &mut StdPrint::default())
    }

    fn execute<T: ResourceTracker>(
        &self,
        resource_tracker: T,
        print: &mut impl PrintWriter,
        tracer: impl EvalTracer,
    ) -> (Result<Object, Exception>, HeapStats) {
        let mut heap = Heap::new(resource_tracker);
        let result = self.execute_on(&mut heap, print, tracer);
        (result, heap.stats())
    }

    fn execute_on<T: ResourceTracker>(
        &self,
        heap: &mut Heap<T>,
        print: &mut impl PrintWriter,
        tracer: impl EvalTracer,
    ) -> Result<Object, Exception> {
        let to_exception = |err: crate::exception_private::RunError| err.into_python_exception(&self.interns, &self.code);
        let module_scope = namespace::enter_scope(heap, None, ScopeKind::Module)
            .map_err(|err| to_exception(err.into()))?;
        namespace::define(
            heap,
            module_scope,
            StaticStrings::DunderName.into(),
            StaticStrings::DunderMain.into(),
        );
        let mut evaluator = Evaluator::new(
            heap,
            &self.interns,
            &self.functions,
            print,
            tracer,
            module_scope,
            Instant::now(),
        );
        let value = evaluator.run_module(&self.nodes).map_err(to_exception)?;
        Ok(Object::new(value, heap, &self.interns))
    }
}
