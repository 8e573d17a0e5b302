//! Evaluator tracing infrastructure.
//!
//! The evaluator is parameterized as `Evaluator<'a, T: ResourceTracker, P: PrintWriter, Tr: EvalTracer>`,
//! so the tracer is picked at construction time and a [`NoopTracer`] inlines every hook to nothing.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | No-op (default) |
//! | [`StderrTracer`] | Human-readable execution log to stderr |
//! | [`ProfilingTracer`] | Statement counts, call depth and collector activity |
//! | [`RecordingTracer`] | Full event recording for post-mortem analysis |
//!
//! ```ignore
//! let mut tracer = ProfilingTracer::new();
//! runner.run_with_tracer(NoLimitTracker, &mut StdPrint::default(), &mut tracer)?;
//! eprintln!("{}", tracer.report());
//! ```

use std::collections::HashMap;

/// Trace event emitted during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A statement is about to run.
    Statement {
        /// 1-based source line.
        line: u32,
        /// Statement kind, e.g. `Assign` or `For`.
        kind: &'static str,
    },
    /// A call pushed a new frame.
    Call { func_name: String, depth: usize },
    /// A frame was popped.
    Return { depth: usize },
    /// A heap object was allocated.
    Allocate { type_name: &'static str },
    /// A garbage collection finished.
    Collect { freed: usize, live: usize },
}

/// Hooks called by the evaluator at key execution events.
///
/// Every method has a no-op default, so implementations override only what they need.
pub trait EvalTracer: std::fmt::Debug {
    /// Called at each statement safepoint, before the statement runs.
    #[inline(always)]
    fn on_statement(&mut self, _line: u32, _kind: &'static str, _frame_depth: usize) {}

    /// Called when a function or class body frame is pushed.
    ///
    /// # Arguments
    /// * `func_name` - Function or class name
    /// * `depth` - Call stack depth after the push
    #[inline(always)]
    fn on_call(&mut self, _func_name: &str, _depth: usize) {}

    /// Called when a frame is popped.
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called after every successful heap allocation.
    #[inline(always)]
    fn on_allocate(&mut self, _type_name: &'static str) {}

    /// Called when a collection finishes.
    ///
    /// # Arguments
    /// * `freed` - Objects reclaimed by this collection
    /// * `live` - Objects still live afterwards
    #[inline(always)]
    fn on_collect(&mut self, _freed: usize, _live: usize) {}
}

impl<Tr: EvalTracer> EvalTracer for &mut Tr {
    #[inline]
    fn on_statement(&mut self, line: u32, kind: &'static str, frame_depth: usize) {
        (**self).on_statement(line, kind, frame_depth);
    }

    #[inline]
    fn on_call(&mut self, func_name: &str, depth: usize) {
        (**self).on_call(func_name, depth);
    }

    #[inline]
    fn on_return(&mut self, depth: usize) {
        (**self).on_return(depth);
    }

    #[inline]
    fn on_allocate(&mut self, type_name: &'static str) {
        (**self).on_allocate(type_name);
    }

    #[inline]
    fn on_collect(&mut self, freed: usize, live: usize) {
        (**self).on_collect(freed, live);
    }
}

// ============================================================================
// NoopTracer
// ============================================================================

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EvalTracer for NoopTracer {}

// ============================================================================
// StderrTracer
// ============================================================================

/// Tracer that prints a human-readable execution log to stderr.
///
/// ```text
/// [line    3] Assign        frames=1
///   >>> CALL make_pair      depth=2
///   +++ ALLOC Tuple
///   <<< RETURN              depth=1
///   ### GC freed=12 live=40
/// ```
#[derive(Debug, Default)]
pub struct StderrTracer {
    /// Maximum number of statements to trace; `None` traces everything.
    limit: Option<usize>,
    count: usize,
    stopped: bool,
}

impl StderrTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracer that goes quiet after `limit` statements.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl EvalTracer for StderrTracer {
    fn on_statement(&mut self, line: u32, kind: &'static str, frame_depth: usize) {
        if self.stopped {
            return;
        }
        eprintln!("[line {line:>4}] {kind:<14} frames={frame_depth}");
        self.count += 1;
        if let Some(limit) = self.limit
            && self.count >= limit
        {
            eprintln!("--- trace limit reached ({limit} statements) ---");
            self.stopped = true;
        }
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        if !self.stopped {
            eprintln!("  >>> CALL {func_name:<20} depth={depth}");
        }
    }

    fn on_return(&mut self, depth: usize) {
        if !self.stopped {
            eprintln!("  <<< RETURN              depth={depth}");
        }
    }

    fn on_allocate(&mut self, type_name: &'static str) {
        if !self.stopped {
            eprintln!("  +++ ALLOC {type_name}");
        }
    }

    fn on_collect(&mut self, freed: usize, live: usize) {
        // collections are rare and interesting enough to log past the limit
        eprintln!("  ### GC freed={freed} live={live}");
    }
}

// ============================================================================
// ProfilingTracer
// ============================================================================

/// Tracer that collects execution statistics.
///
/// Retrieve results via [`ProfilingTracer::report`] after execution.
#[derive(Debug, Default)]
pub struct ProfilingTracer {
    statement_counts: HashMap<&'static str, u64>,
    allocation_counts: HashMap<&'static str, u64>,
    total_statements: u64,
    total_calls: u64,
    max_depth: usize,
    collections: u64,
    total_freed: u64,
}

/// Summary report from a profiling trace.
#[derive(Debug, Clone)]
pub struct ProfilingReport {
    /// Per statement-kind counts, most frequent first.
    pub statement_counts: Vec<(&'static str, u64)>,
    /// Per heap-type allocation counts, most frequent first.
    pub allocation_counts: Vec<(&'static str, u64)>,
    pub total_statements: u64,
    pub total_calls: u64,
    pub max_depth: usize,
    pub collections: u64,
    pub total_freed: u64,
}

impl ProfilingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> ProfilingReport {
        ProfilingReport {
            statement_counts: sorted_counts(&self.statement_counts),
            allocation_counts: sorted_counts(&self.allocation_counts),
            total_statements: self.total_statements,
            total_calls: self.total_calls,
            max_depth: self.max_depth,
            collections: self.collections,
            total_freed: self.total_freed,
        }
    }
}

/// Sorts by count descending, then name, so reports are stable.
fn sorted_counts(counts: &HashMap<&'static str, u64>) -> Vec<(&'static str, u64)> {
    let mut sorted: Vec<_> = counts.iter().map(|(&k, &v)| (k, v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    sorted
}

impl EvalTracer for ProfilingTracer {
    #[inline]
    fn on_statement(&mut self, _line: u32, kind: &'static str, _frame_depth: usize) {
        *self.statement_counts.entry(kind).or_insert(0) += 1;
        self.total_statements += 1;
    }

    #[inline]
    fn on_call(&mut self, _func_name: &str, depth: usize) {
        self.total_calls += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    #[inline]
    fn on_allocate(&mut self, type_name: &'static str) {
        *self.allocation_counts.entry(type_name).or_insert(0) += 1;
    }

    fn on_collect(&mut self, freed: usize, _live: usize) {
        self.collections += 1;
        self.total_freed += freed as u64;
    }
}

impl std::fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== nanopy Profiling Report ===")?;
        writeln!(f, "Total statements:   {}", self.total_statements)?;
        writeln!(f, "Total calls:        {}", self.total_calls)?;
        writeln!(f, "Max call depth:     {}", self.max_depth)?;
        writeln!(f, "Collections:        {}", self.collections)?;
        writeln!(f, "Objects freed:      {}", self.total_freed)?;
        writeln!(f)?;
        writeln!(f, "--- Statement Frequency ---")?;
        for (kind, count) in &self.statement_counts {
            let pct = (*count as f64 / self.total_statements.max(1) as f64) * 100.0;
            writeln!(f, "  {kind:<20} {count:>10}  ({pct:>5.1}%)")?;
        }
        writeln!(f)?;
        writeln!(f, "--- Allocations ---")?;
        for (type_name, count) in &self.allocation_counts {
            writeln!(f, "  {type_name:<20} {count:>10}")?;
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTracer
// ============================================================================

/// Tracer that records every event in order.
///
/// This allocates per event, so keep it to short runs or give it a limit.
#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
    limit: Option<usize>,
}

impl RecordingTracer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording tracer that stops recording after `limit` events.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            events: Vec::with_capacity(limit.min(1024)),
            limit: Some(limit),
        }
    }

    #[must_use]
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    fn record(&mut self, event: TraceEvent) {
        if self.limit.is_none_or(|l| self.events.len() < l) {
            self.events.push(event);
        }
    }
}

impl EvalTracer for RecordingTracer {
    fn on_statement(&mut self, line: u32, kind: &'static str, _frame_depth: usize) {
        self.record(TraceEvent::Statement { line, kind });
    }

    fn on_call(&mut self, func_name: &str, depth: usize) {
        self.record(TraceEvent::Call {
            func_name: func_name.to_owned(),
            depth,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.record(TraceEvent::Return { depth });
    }

    fn on_allocate(&mut self, type_name: &'static str) {
        self.record(TraceEvent::Allocate { type_name });
    }

    fn on_collect(&mut self, freed: usize, live: usize) {
        self.record(TraceEvent::Collect { freed, live });
    }
}
