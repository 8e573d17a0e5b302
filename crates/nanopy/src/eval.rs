//! Tree-walking evaluator.
//!
//! The evaluator owns the root set the collector traces from:
//! * the module scope
//! * the scope of every active call frame
//! * `temp_roots`, a stack of in-flight values that are not stored anywhere yet
//!
//! Collections only run at statement boundaries (safepoints) and in `gc_collect()`.
//! Any composite value that must survive the evaluation of another sub-expression
//! is pushed onto `temp_roots` first; every statement truncates the stack back to
//! where it found it, so temporaries never outlive the statement that made them.

use std::time::Instant;

use ahash::AHashSet;

use crate::{
    args::{ArgExprs, ArgValues},
    builtins::Builtins,
    exception_private::{ExcType, RunError, RunResult, SimpleException},
    expressions::{AssignTarget, Expr, ExprLoc, Identifier, Node, Operator, StmtLoc, UnpackTarget},
    function::{Function, FunctionDef},
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StaticStrings, StringId},
    io::PrintWriter,
    namespace::{self, NameUnbound, ScopeKind},
    parse::CodeRange,
    resource::ResourceTracker,
    tracer::EvalTracer,
    types::{
        BoundMethod, ClassObject, Dict, Instance, List, Range, Set, Str, Tuple,
        class::lookup_class_attr,
        dict::dict_set,
        list::normalize_index,
        str::char_at,
    },
    value::Value,
};

/// Stack space kept free before each call; below it the stack is grown.
const RED_ZONE: usize = 100 * 1024;
/// Size of each additional stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f` with enough native stack for one more level of Python calls.
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// How a statement finished.
#[derive(Debug, Clone, Copy)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// An active call: module code, a function call, or a class body.
#[derive(Debug)]
struct Frame {
    scope: HeapId,
    name: StringId,
    /// Names declared `global` in this frame.
    globals: AHashSet<StringId>,
    /// Names declared `nonlocal` in this frame.
    nonlocals: AHashSet<StringId>,
    /// Statement currently executing, for tracebacks.
    position: CodeRange,
}

impl Frame {
    fn new(scope: HeapId, name: StringId, position: CodeRange) -> Self {
        Self {
            scope,
            name,
            globals: AHashSet::new(),
            nonlocals: AHashSet::new(),
            position,
        }
    }
}

/// Where a `for` loop takes its items from.
///
/// Containers are read by index on every step, so the loop sees mutations made
/// by its body the way Python does, and never holds a borrow of the heap.
enum IterSource {
    /// A list or tuple; the length is re-read each step.
    Sequence(HeapId),
    Dict { id: HeapId, len: usize },
    Set { id: HeapId, len: usize },
    Range(Range),
    Chars(Vec<char>),
}

/// Evaluates parsed code against a heap.
///
/// Generic over the resource tracker, the print writer and the tracer; the
/// defaults (`NoLimitTracker`, `NoopTracer`) compile down to nothing.
pub(crate) struct Evaluator<'a, T: ResourceTracker, P: PrintWriter, Tr: EvalTracer> {
    pub heap: &'a mut Heap<T>,
    pub interns: &'a Interns,
    functions: &'a [FunctionDef],
    pub print: &'a mut P,
    tracer: Tr,
    module_scope: HeapId,
    frames: Vec<Frame>,
    temp_roots: Vec<Value>,
    /// Value of the latest top-level expression statement; rooted so it can be
    /// returned once the module finishes.
    last_value: Value,
    /// Start of the run, for `clock()`.
    pub started: Instant,
}

impl<'a, T: ResourceTracker, P: PrintWriter, Tr: EvalTracer> Evaluator<'a, T, P, Tr> {
    pub fn new(
        heap: &'a mut Heap<T>,
        interns: &'a Interns,
        functions: &'a [FunctionDef],
        print: &'a mut P,
        tracer: Tr,
        module_scope: HeapId,
        started: Instant,
    ) -> Self {
        Self {
            heap,
            interns,
            functions,
            print,
            tracer,
            module_scope,
            frames: Vec::new(),
            temp_roots: Vec::new(),
            last_value: Value::None,
            started,
        }
    }

    /// Runs top-level code in the module scope.
    ///
    /// Returns the value of the final statement if it is an expression, else `None`.
    pub fn run_module(&mut self, nodes: &[StmtLoc]) -> RunResult<Value> {
        let position = nodes.first().map(|stmt| stmt.position).unwrap_or_default();
        self.frames
            .push(Frame::new(self.module_scope, StaticStrings::Module.into(), position));
        let result = self.exec_block(nodes);
        let frame = self.frames.pop();
        match result {
            Ok(_) => {
                let value = if matches!(nodes.last(), Some(StmtLoc { node: Node::Expr(_), .. })) {
                    self.last_value
                } else {
                    Value::None
                };
                self.last_value = Value::None;
                Ok(value)
            }
            Err(mut err) => {
                if let Some(frame) = frame {
                    err.add_caller_frame(frame.position, frame.name);
                }
                self.last_value = Value::None;
                Err(err)
            }
        }
    }

    /// Allocates `data` on the heap and reports it to the tracer.
    pub(crate) fn allocate(&mut self, data: HeapData) -> RunResult<Value> {
        let type_name = data.type_name();
        let id = self.heap.allocate(data)?;
        self.tracer.on_allocate(type_name);
        Ok(Value::Ref(id))
    }

    /// A runtime string; single ASCII characters reuse their interned ids.
    pub(crate) fn alloc_str(&mut self, s: String) -> RunResult<Value> {
        if s.len() == 1 && s.is_ascii() {
            return Ok(Value::InternString(StringId::from_ascii(s.as_bytes()[0])));
        }
        if s.is_empty() {
            return Ok(StaticStrings::EmptyString.into());
        }
        self.allocate(HeapData::Str(Str::from(s)))
    }

    fn char_value(&mut self, c: char) -> RunResult<Value> {
        self.alloc_str(c.to_string())
    }

    fn new_scope(&mut self, parent: Option<HeapId>, kind: ScopeKind) -> RunResult<HeapId> {
        let id = namespace::enter_scope(self.heap, parent, kind)?;
        self.tracer.on_allocate("Scope");
        Ok(id)
    }

    /// Every handle the evaluator holds right now.
    fn roots(&self) -> Vec<HeapId> {
        let mut roots = Vec::with_capacity(self.frames.len() + self.temp_roots.len() + 2);
        roots.push(self.module_scope);
        roots.extend(self.frames.iter().map(|frame| frame.scope));
        roots.extend(self.temp_roots.iter().filter_map(Value::ref_id));
        roots.extend(self.last_value.ref_id());
        roots
    }

    /// Runs a full collection now and returns the number of objects freed.
    pub(crate) fn collect_garbage(&mut self) -> usize {
        let roots = self.roots();
        let freed = self.heap.collect_garbage(roots);
        self.tracer.on_collect(freed, self.heap.live_objects());
        freed
    }

    /// Pushes a temporary root and returns the mark to truncate back to.
    fn push_root(&mut self, value: Value) -> usize {
        let mark = self.temp_roots.len();
        self.temp_roots.push(value);
        mark
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("evaluator has no active frame")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("evaluator has no active frame")
    }

    /// Function calls on the stack, excluding module code.
    fn call_depth(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn exec_block(&mut self, body: &[StmtLoc]) -> RunResult<Flow> {
        for stmt in body {
            let flow = self.exec_stmt(stmt)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &StmtLoc) -> RunResult<Flow> {
        self.frame_mut().position = stmt.position;
        self.safepoint(stmt)?;
        let mark = self.temp_roots.len();
        let result = self.exec_node(&stmt.node, stmt.position);
        self.temp_roots.truncate(mark);
        result
    }

    /// Statement boundary: time limit, tracing, and any pending collection.
    fn safepoint(&mut self, stmt: &StmtLoc) -> RunResult<()> {
        self.heap.tracker_mut().check_time()?;
        self.tracer
            .on_statement(stmt.position.line(), stmt.node.kind(), self.frames.len());
        if self.heap.should_gc() {
            self.collect_garbage();
        }
        Ok(())
    }

    fn exec_node(&mut self, node: &Node, position: CodeRange) -> RunResult<Flow> {
        match node {
            Node::Pass => {}
            Node::Expr(expr) => {
                let value = self.eval(expr)?;
                if self.frames.len() == 1 {
                    self.last_value = value;
                }
            }
            Node::Return(expr) => return Ok(Flow::Return(self.eval(expr)?)),
            Node::ReturnNone => return Ok(Flow::Return(Value::None)),
            Node::Assign { target, object } => {
                let value = self.eval(object)?;
                self.store_name(target.name_id, value)?;
            }
            Node::UnpackAssign {
                targets,
                targets_position,
                object,
            } => {
                let value = self.eval(object)?;
                self.push_root(value);
                self.unpack(targets, *targets_position, value)?;
            }
            Node::ChainAssign { targets, object } => {
                let value = self.eval(object)?;
                self.push_root(value);
                for target in targets {
                    self.assign_chain_target(target, value)?;
                }
            }
            Node::OpAssign { target, op, object } => {
                let current = self.load_name(target)?;
                self.push_root(current);
                let rhs = self.eval(object)?;
                self.push_root(rhs);
                let result = self.inplace_op(current, *op, rhs)?;
                self.store_name(target.name_id, result)?;
            }
            Node::OpAssignAttr { object, attr, op, value } => {
                let object = self.eval(object)?;
                self.push_root(object);
                let current = self.get_attr(object, *attr)?;
                self.push_root(current);
                let rhs = self.eval(value)?;
                self.push_root(rhs);
                let result = self.inplace_op(current, *op, rhs)?;
                self.set_attr(object, *attr, result)?;
            }
            Node::OpAssignSubscr { object, index, op, value } => {
                let object = self.eval(object)?;
                self.push_root(object);
                let index = self.eval(index)?;
                self.push_root(index);
                let current = self.get_item(object, index)?;
                self.push_root(current);
                let rhs = self.eval(value)?;
                self.push_root(rhs);
                let result = self.inplace_op(current, *op, rhs)?;
                self.set_item(object, index, result)?;
            }
            Node::SubscriptAssign { target, index, value } => {
                let value = self.eval(value)?;
                self.push_root(value);
                let object = self.eval(target)?;
                self.push_root(object);
                let index = self.eval(index)?;
                self.push_root(index);
                self.set_item(object, index, value)?;
            }
            Node::AttrAssign { object, attr, value } => {
                let value = self.eval(value)?;
                self.push_root(value);
                let object = self.eval(object)?;
                self.set_attr(object, *attr, value)?;
            }
            Node::For {
                target,
                iter,
                body,
                or_else,
            } => return self.exec_for(target, iter, body, or_else, position),
            Node::While { test, body, or_else } => {
                loop {
                    self.frame_mut().position = position;
                    let condition = self.eval(test)?;
                    if !condition.py_bool(self.heap, self.interns) {
                        break;
                    }
                    match self.exec_block(body)? {
                        Flow::Break => return Ok(Flow::Normal),
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                return self.exec_block(or_else);
            }
            Node::If { test, body, or_else } => {
                let condition = self.eval(test)?;
                return if condition.py_bool(self.heap, self.interns) {
                    self.exec_block(body)
                } else {
                    self.exec_block(or_else)
                };
            }
            Node::FunctionDef(func_id) => {
                let functions = self.functions;
                let def = &functions[func_id.index()];
                let mark = self.temp_roots.len();
                let mut defaults = Vec::new();
                for param in &def.params {
                    if let Some(default) = &param.default {
                        let value = self.eval(default)?;
                        self.temp_roots.push(value);
                        defaults.push(value);
                    }
                }
                let scope = namespace::capture_scope(self.heap, self.frame().scope);
                let function = self.allocate(HeapData::Function(Function {
                    func_id: *func_id,
                    name: def.name.name_id,
                    scope,
                    defaults,
                }))?;
                self.temp_roots.truncate(mark);
                self.store_name(def.name.name_id, function)?;
            }
            Node::ClassDef(class_def) => {
                let parent = match &class_def.base {
                    Some(base) => {
                        let base = self.eval(base)?;
                        self.push_root(base);
                        match base {
                            Value::Ref(id) if matches!(self.heap.get(id), HeapData::Class(_)) => Some(id),
                            other => {
                                return Err(ExcType::type_error(format!(
                                    "base class must be a class, not '{}'",
                                    other.type_name(self.heap, self.interns)
                                )));
                            }
                        }
                    }
                    None => None,
                };
                let name = class_def.name.name_id;
                let enclosing = self.frame().scope;
                let scope = self.new_scope(Some(enclosing), ScopeKind::Class)?;
                self.frames.push(Frame::new(scope, name, position));
                self.tracer.on_call(self.interns.get_str(name), self.frames.len() - 1);
                let result = self.exec_block(&class_def.body);
                let frame = self.frames.pop();
                self.tracer.on_return(self.frames.len());
                if let Err(mut err) = result {
                    if let Some(frame) = frame {
                        err.add_caller_frame(frame.position, frame.name);
                    }
                    return Err(err);
                }
                let attrs = match self.heap.get(scope) {
                    HeapData::Scope(scope) => scope.vars().clone(),
                    _ => return Err(RunError::internal("class body scope is not a scope")),
                };
                let class = self.allocate(HeapData::Class(ClassObject::new(name, parent, attrs)))?;
                self.store_name(name, class)?;
            }
            Node::Global(names) => {
                if self.frames.len() > 1 {
                    self.frame_mut().globals.extend(names.iter().copied());
                }
            }
            Node::Nonlocal(names) => {
                if self.frames.len() == 1 {
                    return Err(SimpleException::new_msg(
                        ExcType::SyntaxError,
                        "nonlocal declaration not allowed at module level",
                    )
                    .into());
                }
                let parent = self.scope_parent(self.frame().scope);
                for &name in names {
                    if namespace::find_nonlocal(self.heap, parent, name).is_none() {
                        return Err(SimpleException::new_msg(
                            ExcType::SyntaxError,
                            format!("no binding for nonlocal '{}' found", self.interns.get_str(name)),
                        )
                        .into());
                    }
                    self.frame_mut().nonlocals.insert(name);
                }
            }
            Node::Break => return Ok(Flow::Break),
            Node::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        target: &UnpackTarget,
        iter: &ExprLoc,
        body: &[StmtLoc],
        or_else: &[StmtLoc],
        position: CodeRange,
    ) -> RunResult<Flow> {
        let iterable = self.eval(iter)?;
        self.push_root(iterable);
        let source = self.iter_source(iterable)?;
        let mut index = 0;
        loop {
            self.frame_mut().position = position;
            let Some(item) = self.iter_next(&source, index)? else {
                break;
            };
            index += 1;
            self.assign_target(target, item)?;
            match self.exec_block(body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }
        self.exec_block(or_else)
    }

    fn iter_source(&self, iterable: Value) -> RunResult<IterSource> {
        if let Value::InternString(id) = iterable {
            return Ok(IterSource::Chars(self.interns.get_str(id).chars().collect()));
        }
        if let Value::Ref(id) = iterable {
            match self.heap.get(id) {
                HeapData::List(_) | HeapData::Tuple(_) => return Ok(IterSource::Sequence(id)),
                HeapData::Dict(dict) => return Ok(IterSource::Dict { id, len: dict.len() }),
                HeapData::Set(set) => return Ok(IterSource::Set { id, len: set.len() }),
                HeapData::Range(range) => return Ok(IterSource::Range(*range)),
                HeapData::Str(s) => return Ok(IterSource::Chars(s.as_str().chars().collect())),
                _ => {}
            }
        }
        Err(ExcType::type_error_not_iterable(
            &iterable.type_name(self.heap, self.interns),
        ))
    }

    fn iter_next(&mut self, source: &IterSource, index: usize) -> RunResult<Option<Value>> {
        match source {
            IterSource::Sequence(id) => Ok(match self.heap.get(*id) {
                HeapData::List(list) => list.get(index),
                HeapData::Tuple(tuple) => tuple.as_slice().get(index).copied(),
                _ => None,
            }),
            IterSource::Dict { id, len } => match self.heap.get(*id) {
                HeapData::Dict(dict) if dict.len() == *len => Ok(dict.entry_at(index).map(|(key, _)| key)),
                _ => Err(SimpleException::new_msg(ExcType::RuntimeError, "dictionary changed size during iteration").into()),
            },
            IterSource::Set { id, len } => match self.heap.get(*id) {
                HeapData::Set(set) if set.len() == *len => Ok(set.value_at(index)),
                _ => Err(SimpleException::new_msg(ExcType::RuntimeError, "Set changed size during iteration").into()),
            },
            IterSource::Range(range) => Ok(range.get(index).map(Value::Int)),
            IterSource::Chars(chars) => match chars.get(index) {
                Some(c) => self.char_value(*c).map(Some),
                None => Ok(None),
            },
        }
    }

    /// Snapshot of the items of an iterable, for builtins and unpacking.
    pub(crate) fn collect_iterable(&mut self, iterable: Value) -> RunResult<Vec<Value>> {
        let source = self.iter_source(iterable)?;
        match source {
            IterSource::Sequence(id) => Ok(match self.heap.get(id) {
                HeapData::List(list) => list.as_slice().to_vec(),
                HeapData::Tuple(tuple) => tuple.as_slice().to_vec(),
                _ => Vec::new(),
            }),
            IterSource::Dict { id, .. } => Ok(match self.heap.get(id) {
                HeapData::Dict(dict) => dict.iter().map(|(key, _)| *key).collect(),
                _ => Vec::new(),
            }),
            IterSource::Set { id, .. } => Ok(match self.heap.get(id) {
                HeapData::Set(set) => set.iter().copied().collect(),
                _ => Vec::new(),
            }),
            IterSource::Range(range) => {
                let len = range.len();
                let bytes = len.saturating_mul(size_of::<Value>());
                if bytes > crate::resource::LARGE_RESULT_THRESHOLD {
                    self.heap.tracker().check_large_result(bytes)?;
                }
                Ok((0..len).filter_map(|i| range.get(i)).map(Value::Int).collect())
            }
            IterSource::Chars(chars) => chars.into_iter().map(|c| self.char_value(c)).collect(),
        }
    }

    fn assign_target(&mut self, target: &UnpackTarget, value: Value) -> RunResult<()> {
        match target {
            UnpackTarget::Name(ident) => self.store_name(ident.name_id, value),
            UnpackTarget::Tuple { targets, position } => {
                let mark = self.push_root(value);
                let result = self.unpack(targets, *position, value);
                self.temp_roots.truncate(mark);
                result
            }
        }
    }

    /// Stores one link of `a = obj.x = items[0] = value`; `value` is already rooted.
    fn assign_chain_target(&mut self, target: &AssignTarget, value: Value) -> RunResult<()> {
        match target {
            AssignTarget::Name(name) => self.store_name(name.name_id, value),
            AssignTarget::Attr { object, attr } => {
                let object = self.eval(object)?;
                self.set_attr(object, *attr, value)
            }
            AssignTarget::Subscript { object, index } => {
                let object = self.eval(object)?;
                self.push_root(object);
                let index = self.eval(index)?;
                self.push_root(index);
                self.set_item(object, index, value)
            }
            AssignTarget::Unpack { targets, position } => self.unpack(targets, *position, value),
        }
    }

    /// `a, b = value`: binds each target to the matching item of `value`.
    fn unpack(&mut self, targets: &[UnpackTarget], position: CodeRange, value: Value) -> RunResult<()> {
        self.frame_mut().position = position;
        let items = self.collect_iterable(value)?;
        if items.len() < targets.len() {
            return Err(SimpleException::new_msg(
                ExcType::ValueError,
                format!(
                    "not enough values to unpack (expected {}, got {})",
                    targets.len(),
                    items.len()
                ),
            )
            .into());
        }
        if items.len() > targets.len() {
            return Err(SimpleException::new_msg(
                ExcType::ValueError,
                format!("too many values to unpack (expected {})", targets.len()),
            )
            .into());
        }
        let mark = self.temp_roots.len();
        self.temp_roots.extend(items.iter().copied());
        for (target, item) in targets.iter().zip(items) {
            self.assign_target(target, item)?;
        }
        self.temp_roots.truncate(mark);
        Ok(())
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn load_name(&self, ident: &Identifier) -> RunResult<Value> {
        let name = ident.name_id;
        let frame = self.frame();
        let start = if frame.globals.contains(&name) {
            self.module_scope
        } else {
            frame.scope
        };
        if let Some(value) = namespace::lookup(self.heap, start, name) {
            return Ok(value);
        }
        let text = self.interns.get_str(name);
        match Builtins::from_name(text) {
            Some(builtin) => Ok(Value::Builtin(builtin)),
            None => Err(ExcType::name_error(text).into()),
        }
    }

    /// Binds `name` in the current frame, honouring `global` and `nonlocal`.
    fn store_name(&mut self, name: StringId, value: Value) -> RunResult<()> {
        let frame = self.frame();
        let (is_global, is_nonlocal, scope) = (
            frame.globals.contains(&name),
            frame.nonlocals.contains(&name),
            frame.scope,
        );
        if is_global {
            namespace::define(self.heap, self.module_scope, name, value);
            Ok(())
        } else if is_nonlocal {
            let parent = self.scope_parent(scope);
            let result = match parent {
                Some(parent) => namespace::assign(self.heap, parent, name, value),
                None => Err(NameUnbound),
            };
            result.map_err(|NameUnbound| {
                SimpleException::new_msg(
                    ExcType::SyntaxError,
                    format!("no binding for nonlocal '{}' found", self.interns.get_str(name)),
                )
                .into()
            })
        } else {
            namespace::define(self.heap, scope, name, value);
            Ok(())
        }
    }

    fn scope_parent(&self, scope: HeapId) -> Option<HeapId> {
        match self.heap.get(scope) {
            HeapData::Scope(scope) => scope.parent,
            _ => None,
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&mut self, expr: &ExprLoc) -> RunResult<Value> {
        match &expr.expr {
            Expr::Literal(literal) => Ok((*literal).into()),
            Expr::Name(ident) => self.load_name(ident),
            Expr::List(items) => {
                let mark = self.temp_roots.len();
                let values = self.eval_rooted(items)?;
                let list = self.allocate(HeapData::List(List::new(values)));
                self.temp_roots.truncate(mark);
                list
            }
            Expr::Tuple(items) => {
                let mark = self.temp_roots.len();
                let values = self.eval_rooted(items)?;
                let tuple = self.allocate(HeapData::Tuple(Tuple::new(values)));
                self.temp_roots.truncate(mark);
                tuple
            }
            Expr::Set(items) => {
                let mark = self.temp_roots.len();
                let values = self.eval_rooted(items)?;
                let mut set = Set::new();
                for value in values {
                    set.add(value, self.heap, self.interns)?;
                }
                let set = self.allocate(HeapData::Set(set));
                self.temp_roots.truncate(mark);
                set
            }
            Expr::Dict(pairs) => {
                let mark = self.temp_roots.len();
                let mut dict = Dict::new();
                for (key, value) in pairs {
                    let key = self.eval(key)?;
                    self.temp_roots.push(key);
                    let value = self.eval(value)?;
                    self.temp_roots.push(value);
                    dict.set(key, value, self.heap, self.interns)?;
                }
                let dict = self.allocate(HeapData::Dict(dict));
                self.temp_roots.truncate(mark);
                dict
            }
            Expr::Op {
                left,
                op: op @ (Operator::And | Operator::Or),
                right,
            } => {
                // short-circuit, yielding the deciding operand
                let left = self.eval(left)?;
                let truthy = left.py_bool(self.heap, self.interns);
                if truthy == (*op == Operator::Or) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Op { left, op, right } => {
                let left = self.eval(left)?;
                let mark = self.push_root(left);
                let right = self.eval(right)?;
                self.temp_roots.push(right);
                let result = self.binary_op(left, *op, right);
                self.temp_roots.truncate(mark);
                result
            }
            Expr::CmpOp { left, op, right } => {
                let left = self.eval(left)?;
                let mark = self.push_root(left);
                let right = self.eval(right)?;
                let result = self.compare(left, *op, right);
                self.temp_roots.truncate(mark);
                result.map(Value::Bool)
            }
            Expr::ChainCmp { left, comparisons } => {
                let mark = self.temp_roots.len();
                let mut left = self.eval(left)?;
                let mut result = true;
                for (op, right) in comparisons {
                    self.temp_roots.push(left);
                    let right = self.eval(right)?;
                    if !self.compare(left, *op, right)? {
                        result = false;
                        break;
                    }
                    left = right;
                }
                self.temp_roots.truncate(mark);
                Ok(Value::Bool(result))
            }
            Expr::Not(operand) => {
                let value = self.eval(operand)?;
                Ok(Value::Bool(!value.py_bool(self.heap, self.interns)))
            }
            Expr::UnaryMinus(operand) => {
                let value = self.eval(operand)?;
                self.negate(value)
            }
            Expr::UnaryPlus(operand) => {
                let value = self.eval(operand)?;
                match value {
                    Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                    Value::Int(_) | Value::Float(_) => Ok(value),
                    _ => Err(ExcType::unary_type_error(
                        "+",
                        &value.type_name(self.heap, self.interns),
                    )),
                }
            }
            Expr::IfElse { test, body, orelse } => {
                let test = self.eval(test)?;
                if test.py_bool(self.heap, self.interns) {
                    self.eval(body)
                } else {
                    self.eval(orelse)
                }
            }
            Expr::Call { callable, args } => {
                let callable = self.eval(callable)?;
                let mark = self.push_root(callable);
                let args = self.eval_args(args)?;
                let result = self.call_value(callable, args);
                self.temp_roots.truncate(mark);
                result
            }
            Expr::AttrCall { object, attr, args } => {
                let object = self.eval(object)?;
                let mark = self.push_root(object);
                let args = self.eval_args(args)?;
                let result = self.call_attr(object, *attr, args);
                self.temp_roots.truncate(mark);
                result
            }
            Expr::AttrGet { object, attr } => {
                let object = self.eval(object)?;
                let mark = self.push_root(object);
                let result = self.get_attr(object, *attr);
                self.temp_roots.truncate(mark);
                result
            }
            Expr::Subscript { object, index } => {
                let object = self.eval(object)?;
                let mark = self.push_root(object);
                let index = self.eval(index)?;
                self.temp_roots.push(index);
                let result = self.get_item(object, index);
                self.temp_roots.truncate(mark);
                result
            }
        }
    }

    /// Evaluates each expression in turn, rooting every result.
    ///
    /// The caller truncates `temp_roots` once the values are stored somewhere.
    fn eval_rooted(&mut self, items: &[ExprLoc]) -> RunResult<Vec<Value>> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            let value = self.eval(item)?;
            self.temp_roots.push(value);
            values.push(value);
        }
        Ok(values)
    }

    fn eval_args(&mut self, args: &ArgExprs) -> RunResult<ArgValues> {
        let mut values = ArgValues::default();
        for arg in &args.args {
            let value = self.eval(arg)?;
            self.temp_roots.push(value);
            values.args.push(value);
        }
        for kwarg in &args.kwargs {
            let value = self.eval(&kwarg.value)?;
            self.temp_roots.push(value);
            values.kwargs.push((kwarg.key.name_id, value));
        }
        Ok(values)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub(crate) fn call_value(&mut self, callable: Value, args: ArgValues) -> RunResult<Value> {
        match callable {
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Function(_) => self.call_function(id, None, args),
                HeapData::BoundMethod(method) => {
                    let (instance, function) = (method.instance, method.function);
                    self.call_function(function, Some(instance), args)
                }
                HeapData::Class(_) => self.instantiate(id, args),
                _ => Err(ExcType::type_error_not_callable(
                    &callable.type_name(self.heap, self.interns),
                )),
            },
            _ => Err(ExcType::type_error_not_callable(
                &callable.type_name(self.heap, self.interns),
            )),
        }
    }

    /// Calls a user function, with `receiver` prepended as `self` for methods.
    fn call_function(&mut self, function: HeapId, receiver: Option<Value>, mut args: ArgValues) -> RunResult<Value> {
        let functions = self.functions;
        let HeapData::Function(func) = self.heap.get(function) else {
            return Err(RunError::internal("call_function: handle is not a function"));
        };
        let def = &functions[func.func_id.index()];
        let (name, captured) = (func.name, func.scope);
        if let Some(receiver) = receiver {
            args.args.insert(0, receiver);
        }
        let bound = def.bind_args(&func.defaults, args, self.interns)?;

        let depth = self.call_depth();
        self.heap.tracker().check_recursion_depth(depth)?;
        let scope = self.new_scope(Some(captured), ScopeKind::Function)?;
        for (param, value) in def.params.iter().zip(bound) {
            namespace::define(self.heap, scope, param.name, value);
        }
        self.frames.push(Frame::new(scope, name, def.name.position));
        self.tracer.on_call(self.interns.get_str(name), depth + 1);

        let result = ensure_sufficient_stack(|| self.exec_block(&def.body));

        let frame = self.frames.pop();
        self.tracer.on_return(depth + 1);
        match result {
            Ok(Flow::Return(value)) => Ok(value),
            Ok(_) => Ok(Value::None),
            Err(mut err) => {
                if let Some(frame) = frame {
                    err.add_caller_frame(frame.position, frame.name);
                }
                Err(err)
            }
        }
    }

    /// Calling a class: allocates an instance and runs `__init__` if the class
    /// chain defines one.
    fn instantiate(&mut self, class: HeapId, args: ArgValues) -> RunResult<Value> {
        let instance = self.allocate(HeapData::Instance(Instance::new(class)))?;
        let mark = self.push_root(instance);
        let result = match lookup_class_attr(self.heap, class, StaticStrings::DunderInit.into()) {
            Some(Value::Ref(init)) if matches!(self.heap.get(init), HeapData::Function(_)) => {
                match self.call_function(init, Some(instance), args) {
                    Ok(Value::None) => Ok(instance),
                    Ok(other) => Err(ExcType::type_error(format!(
                        "__init__() should return None, not '{}'",
                        other.type_name(self.heap, self.interns)
                    ))),
                    Err(err) => Err(err),
                }
            }
            Some(init) => Err(ExcType::type_error_not_callable(
                &init.type_name(self.heap, self.interns),
            )),
            None if args.args.is_empty() && args.kwargs.is_empty() => Ok(instance),
            None => {
                let name = match self.heap.get(class) {
                    HeapData::Class(class) => self.interns.get_str(class.name),
                    _ => "object",
                };
                Err(ExcType::type_error(format!("{name}() takes no arguments")))
            }
        };
        self.temp_roots.truncate(mark);
        result
    }

    /// `object.attr(args)`: binds methods directly instead of allocating a
    /// bound method object.
    fn call_attr(&mut self, object: Value, attr: StringId, args: ArgValues) -> RunResult<Value> {
        if let Value::Ref(id) = object {
            match self.heap.get(id) {
                HeapData::Instance(instance) => {
                    if let Some(value) = instance.attrs.get(&attr) {
                        let value = *value;
                        return self.call_value(value, args);
                    }
                    return match lookup_class_attr(self.heap, instance.class, attr) {
                        Some(Value::Ref(function)) if matches!(self.heap.get(function), HeapData::Function(_)) => {
                            self.call_function(function, Some(object), args)
                        }
                        Some(value) => self.call_value(value, args),
                        None => Err(ExcType::attribute_error(
                            object.type_name(self.heap, self.interns),
                            self.interns.get_str(attr),
                        )),
                    };
                }
                HeapData::Class(_) | HeapData::Function(_) => {
                    let callable = self.get_attr(object, attr)?;
                    return self.call_value(callable, args);
                }
                _ => {}
            }
        }
        self.call_method(object, attr, args)
    }

    // ========================================================================
    // Attributes and items
    // ========================================================================

    fn get_attr(&mut self, object: Value, attr: StringId) -> RunResult<Value> {
        if let Value::Ref(id) = object {
            match self.heap.get(id) {
                HeapData::Instance(instance) => {
                    if let Some(value) = instance.attrs.get(&attr) {
                        return Ok(*value);
                    }
                    match lookup_class_attr(self.heap, instance.class, attr) {
                        Some(Value::Ref(function)) if matches!(self.heap.get(function), HeapData::Function(_)) => {
                            return self.allocate(HeapData::BoundMethod(BoundMethod {
                                instance: object,
                                function,
                            }));
                        }
                        Some(value) => return Ok(value),
                        None => {}
                    }
                }
                HeapData::Class(class) => {
                    if attr == StaticStrings::DunderName {
                        return Ok(Value::InternString(class.name));
                    }
                    if let Some(value) = lookup_class_attr(self.heap, id, attr) {
                        return Ok(value);
                    }
                    return Err(SimpleException::new_msg(
                        ExcType::AttributeError,
                        format!(
                            "type object '{}' has no attribute '{}'",
                            self.interns.get_str(class.name),
                            self.interns.get_str(attr)
                        ),
                    )
                    .into());
                }
                HeapData::Function(function) if attr == StaticStrings::DunderName => {
                    return Ok(Value::InternString(function.name));
                }
                _ => {}
            }
        }
        Err(ExcType::attribute_error(
            object.type_name(self.heap, self.interns),
            self.interns.get_str(attr),
        ))
    }

    fn set_attr(&mut self, object: Value, attr: StringId, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = object {
            let is_new = match self.heap.get(id) {
                HeapData::Instance(instance) => Some(!instance.attrs.contains_key(&attr)),
                HeapData::Class(class) => Some(!class.attrs.contains_key(&attr)),
                _ => None,
            };
            if let Some(is_new) = is_new {
                if is_new {
                    self.heap.grow(id, 1)?;
                }
                match self.heap.get_mut(id) {
                    HeapData::Instance(instance) => {
                        instance.attrs.insert(attr, value);
                    }
                    HeapData::Class(class) => {
                        class.attrs.insert(attr, value);
                    }
                    _ => {}
                }
                return Ok(());
            }
        }
        Err(ExcType::attribute_error(
            object.type_name(self.heap, self.interns),
            self.interns.get_str(attr),
        ))
    }

    fn get_item(&mut self, object: Value, index: Value) -> RunResult<Value> {
        if let Some(s) = object.as_str(self.heap, self.interns) {
            let Some(i) = index.as_int() else {
                return Err(ExcType::type_error_indices(
                    "string",
                    &index.type_name(self.heap, self.interns),
                ));
            };
            return match char_at(s, i) {
                Some(c) => self.char_value(c),
                None => Err(ExcType::index_error("string")),
            };
        }
        if let Value::Ref(id) = object {
            match self.heap.get(id) {
                HeapData::List(list) => return self.sequence_item(list.as_slice(), "list", index),
                HeapData::Tuple(tuple) => return self.sequence_item(tuple.as_slice(), "tuple", index),
                HeapData::Range(range) => {
                    let Some(i) = index.as_int() else {
                        return Err(ExcType::type_error_indices(
                            "range",
                            &index.type_name(self.heap, self.interns),
                        ));
                    };
                    return normalize_index(i, range.len())
                        .and_then(|i| range.get(i))
                        .map(Value::Int)
                        .ok_or_else(|| {
                            SimpleException::new_msg(ExcType::IndexError, "range object index out of range").into()
                        });
                }
                HeapData::Dict(dict) => {
                    return match dict.get(index, self.heap, self.interns)? {
                        Some(value) => Ok(value),
                        None => Err(ExcType::key_error(index.py_repr(self.heap, self.interns))),
                    };
                }
                _ => {}
            }
        }
        Err(ExcType::type_error_not_sub(
            &object.type_name(self.heap, self.interns),
        ))
    }

    fn sequence_item(&self, items: &[Value], type_name: &str, index: Value) -> RunResult<Value> {
        let Some(i) = index.as_int() else {
            return Err(ExcType::type_error_indices(
                type_name,
                &index.type_name(self.heap, self.interns),
            ));
        };
        normalize_index(i, items.len())
            .map(|i| items[i])
            .ok_or_else(|| ExcType::index_error(type_name))
    }

    fn set_item(&mut self, object: Value, index: Value, value: Value) -> RunResult<()> {
        if let Value::Ref(id) = object {
            match self.heap.get(id) {
                HeapData::List(list) => {
                    let Some(i) = index.as_int() else {
                        return Err(ExcType::type_error_indices(
                            "list",
                            &index.type_name(self.heap, self.interns),
                        ));
                    };
                    let Some(i) = normalize_index(i, list.len()) else {
                        return Err(SimpleException::new_msg(ExcType::IndexError, "list assignment index out of range").into());
                    };
                    if let HeapData::List(list) = self.heap.get_mut(id) {
                        list.set(i, value);
                    }
                    return Ok(());
                }
                HeapData::Dict(_) => return dict_set(self.heap, id, index, value, self.interns),
                _ => {}
            }
        }
        Err(ExcType::type_error_not_sub_assignment(
            &object.type_name(self.heap, self.interns),
        ))
    }
}
