use std::{borrow::Cow, fmt};

use ruff_python_ast::{
    self as ast, BoolOp, CmpOp, ElifElseClause, Expr as AstExpr, Number, Operator as AstOperator, Stmt, UnaryOp,
    name::Name,
};
use ruff_python_parser::parse_module;
use ruff_text_size::{Ranged, TextRange};

use crate::{
    args::{ArgExprs, Kwarg},
    exception_private::ExcType,
    exception_public::{CodeLoc, Exception, StackFrame},
    expressions::{AssignTarget, ClassDef, CmpOperator, Expr, ExprLoc, Identifier, Literal, Node, Operator, StmtLoc, UnpackTarget},
    function::{FunctionDef, Param},
    intern::{FunctionId, InternerBuilder, StringId},
};

/// Maximum nesting depth for AST structures during parsing.
/// Matches CPython's limit of ~200 for nested parentheses.
/// This prevents stack overflow from deeply nested structures like `((((x,),),),)`.
#[cfg(not(debug_assertions))]
pub const MAX_NESTING_DEPTH: u16 = 200;
/// In debug builds the evaluator's stack frames are much larger, so the limit is
/// lower to fail with a `SyntaxError` before the host stack runs out.
#[cfg(debug_assertions)]
pub const MAX_NESTING_DEPTH: u16 = 35;

/// Result of parsing: the statements, the function table they refer to, and the
/// string interner with all interned names.
#[derive(Debug)]
pub struct ParseResult {
    pub nodes: Vec<StmtLoc>,
    /// Every `def` in the source, indexed by `FunctionId` minus the first id.
    pub functions: Vec<FunctionDef>,
    pub interner: InternerBuilder,
}

pub(crate) fn parse(code: &str, filename: &str) -> Result<ParseResult, ParseError> {
    parse_with_interner(code, filename, InternerBuilder::new(code), 0)
}

/// Parses code using an existing interner state.
///
/// REPL sessions parse each snippet with a clone of the session interner, so ids
/// stay stable across lines and a failed parse leaves the session untouched.
/// `first_function_id` continues the session's function table numbering.
pub(crate) fn parse_with_interner(
    code: &str,
    filename: &str,
    interner: InternerBuilder,
    first_function_id: usize,
) -> Result<ParseResult, ParseError> {
    let mut parser = Parser::new(code, filename, interner, first_function_id);
    let parsed = parse_module(code).map_err(|e| ParseError::syntax(e.to_string(), parser.convert_range(e.range())))?;
    let module = parsed.into_syntax();
    let nodes = parser.parse_statements(module.body)?;
    Ok(ParseResult {
        nodes,
        functions: parser.functions,
        interner: parser.interner,
    })
}

/// Lowers the ruff AST into the evaluator's statement and expression tree.
///
/// The filename is interned once at construction and reused for all CodeRanges.
struct Parser<'a> {
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
    code: &'a str,
    filename_id: StringId,
    interner: InternerBuilder,
    functions: Vec<FunctionDef>,
    first_function_id: usize,
    /// Remaining nesting depth budget for recursive structures.
    /// When it reaches zero, we return a "too many nested parentheses" error.
    depth_remaining: u16,
    /// Loops enclosing the current statement within the current function body.
    loop_depth: usize,
    in_function: bool,
}

impl<'a> Parser<'a> {
    fn new(code: &'a str, filename: &str, mut interner: InternerBuilder, first_function_id: usize) -> Self {
        let line_starts = std::iter::once(0)
            .chain(code.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        let filename_id = interner.intern(filename);
        Self {
            line_starts,
            code,
            filename_id,
            interner,
            functions: Vec::new(),
            first_function_id,
            depth_remaining: MAX_NESTING_DEPTH,
            loop_depth: 0,
            in_function: false,
        }
    }

    fn parse_statements(&mut self, statements: Vec<Stmt>) -> Result<Vec<StmtLoc>, ParseError> {
        statements.into_iter().map(|s| self.parse_statement(s)).collect()
    }

    fn parse_statement(&mut self, statement: Stmt) -> Result<StmtLoc, ParseError> {
        self.decr_depth_remaining(|| statement.range())?;
        let position = self.convert_range(statement.range());
        let result = self.parse_statement_impl(statement, position);
        self.depth_remaining += 1;
        Ok(StmtLoc::new(position, result?))
    }

    fn parse_statement_impl(&mut self, statement: Stmt, position: CodeRange) -> Result<Node, ParseError> {
        match statement {
            Stmt::FunctionDef(function) => self.parse_function_def(function, position),
            Stmt::ClassDef(class) => self.parse_class_def(class, position),
            Stmt::Return(_) if !self.in_function => Err(ParseError::syntax("'return' outside function", position)),
            Stmt::Return(ast::StmtReturn { value, .. }) => match value {
                Some(value) => Ok(Node::Return(self.parse_expression(*value)?)),
                None => Ok(Node::ReturnNone),
            },
            Stmt::Assign(ast::StmtAssign { targets, value, .. }) => {
                self.parse_assign_statement(targets, *value, position)
            }
            Stmt::AugAssign(ast::StmtAugAssign { target, op, value, .. }) => {
                let op = convert_op(op, position)?;
                let rhs = self.parse_expression(*value)?;
                match *target {
                    AstExpr::Name(ast::ExprName { id, range, .. }) => Ok(Node::OpAssign {
                        target: self.identifier(&id, range),
                        op,
                        object: rhs,
                    }),
                    AstExpr::Attribute(ast::ExprAttribute { value: obj, attr, .. }) => Ok(Node::OpAssignAttr {
                        object: self.parse_expression(*obj)?,
                        attr: self.interner.intern(attr.as_str()),
                        op,
                        value: rhs,
                    }),
                    AstExpr::Subscript(ast::ExprSubscript { value: obj, slice, .. }) => Ok(Node::OpAssignSubscr {
                        object: self.parse_expression(*obj)?,
                        index: self.parse_index(*slice)?,
                        op,
                        value: rhs,
                    }),
                    _ => Err(ParseError::syntax(
                        "'expression' is an illegal expression for augmented assignment",
                        position,
                    )),
                }
            }
            // annotations are accepted and never evaluated
            Stmt::AnnAssign(ast::StmtAnnAssign { target, value, .. }) => match value {
                Some(value) => {
                    let value = self.parse_expression(*value)?;
                    self.parse_assignment(*target, value)
                }
                None => Ok(Node::Pass),
            },
            Stmt::For(ast::StmtFor {
                is_async,
                target,
                iter,
                body,
                orelse,
                ..
            }) => {
                if is_async {
                    return Err(ParseError::not_implemented("async for loops", position));
                }
                Ok(Node::For {
                    target: self.parse_unpack_target(*target)?,
                    iter: self.parse_expression(*iter)?,
                    body: self.parse_loop_body(body)?,
                    or_else: self.parse_statements(orelse)?,
                })
            }
            Stmt::While(ast::StmtWhile { test, body, orelse, .. }) => Ok(Node::While {
                test: self.parse_expression(*test)?,
                body: self.parse_loop_body(body)?,
                or_else: self.parse_statements(orelse)?,
            }),
            Stmt::If(ast::StmtIf {
                test,
                body,
                elif_else_clauses,
                ..
            }) => {
                let test = self.parse_expression(*test)?;
                let body = self.parse_statements(body)?;
                let or_else = self.parse_elif_else_clauses(elif_else_clauses)?;
                Ok(Node::If { test, body, or_else })
            }
            Stmt::Global(ast::StmtGlobal { names, .. }) => Ok(Node::Global(
                names.iter().map(|name| self.interner.intern(name.as_str())).collect(),
            )),
            Stmt::Nonlocal(ast::StmtNonlocal { names, .. }) => Ok(Node::Nonlocal(
                names.iter().map(|name| self.interner.intern(name.as_str())).collect(),
            )),
            Stmt::Expr(ast::StmtExpr { value, .. }) => self.parse_expression(*value).map(Node::Expr),
            Stmt::Pass(_) => Ok(Node::Pass),
            Stmt::Break(_) if self.loop_depth == 0 => Err(ParseError::syntax("'break' outside loop", position)),
            Stmt::Break(_) => Ok(Node::Break),
            Stmt::Continue(_) if self.loop_depth == 0 => {
                Err(ParseError::syntax("'continue' not properly in loop", position))
            }
            Stmt::Continue(_) => Ok(Node::Continue),
            Stmt::Delete(_) => Err(ParseError::not_implemented("del statements", position)),
            Stmt::TypeAlias(_) => Err(ParseError::not_implemented("type aliases", position)),
            Stmt::With(_) => Err(ParseError::not_implemented("with statements", position)),
            Stmt::Match(_) => Err(ParseError::not_implemented("match statements", position)),
            Stmt::Raise(_) => Err(ParseError::not_implemented("raise statements", position)),
            Stmt::Try(_) => Err(ParseError::not_implemented("try statements", position)),
            Stmt::Assert(_) => Err(ParseError::not_implemented("assert statements", position)),
            Stmt::Import(_) | Stmt::ImportFrom(_) => Err(ParseError::not_implemented("imports", position)),
            Stmt::IpyEscapeCommand(_) => Err(ParseError::not_implemented("IPython escape commands", position)),
        }
    }

    fn parse_function_def(&mut self, function: ast::StmtFunctionDef, position: CodeRange) -> Result<Node, ParseError> {
        if function.is_async {
            return Err(ParseError::not_implemented("async functions", position));
        }
        if !function.decorator_list.is_empty() {
            return Err(ParseError::not_implemented("decorators", position));
        }
        if function.type_params.is_some() {
            return Err(ParseError::not_implemented("type parameters", position));
        }
        let parameters = &function.parameters;
        if !parameters.posonlyargs.is_empty()
            || parameters.vararg.is_some()
            || !parameters.kwonlyargs.is_empty()
            || parameters.kwarg.is_some()
        {
            return Err(ParseError::not_implemented(
                "parameters other than positional-or-keyword",
                position,
            ));
        }

        let mut params = Vec::with_capacity(parameters.args.len());
        for p in &parameters.args {
            let default = match &p.default {
                Some(expr) => Some(self.parse_expression((**expr).clone())?),
                None => None,
            };
            if default.is_none() && params.last().is_some_and(|last: &Param| last.default.is_some()) {
                return Err(ParseError::syntax(
                    "parameter without a default follows parameter with a default",
                    self.convert_range(p.range()),
                ));
            }
            params.push(Param {
                name: self.interner.intern(p.parameter.name.as_str()),
                default,
            });
        }

        let name = self.identifier(&function.name.id, function.name.range);
        let outer = (std::mem::replace(&mut self.in_function, true), std::mem::take(&mut self.loop_depth));
        let body = self.parse_statements(function.body);
        (self.in_function, self.loop_depth) = outer;
        let body = body?;
        let func_id = FunctionId::new(self.first_function_id + self.functions.len());
        self.functions.push(FunctionDef { name, params, body });
        Ok(Node::FunctionDef(func_id))
    }

    fn parse_class_def(&mut self, class: ast::StmtClassDef, position: CodeRange) -> Result<Node, ParseError> {
        if !class.decorator_list.is_empty() {
            return Err(ParseError::not_implemented("class decorators", position));
        }
        let base = match class.arguments {
            Some(arguments) => {
                if !arguments.keywords.is_empty() {
                    return Err(ParseError::not_implemented("class keyword arguments", position));
                }
                let mut bases = arguments.args.into_vec().into_iter();
                let base = bases.next().map(|b| self.parse_expression(b)).transpose()?;
                if bases.next().is_some() {
                    return Err(ParseError::not_implemented("multiple inheritance", position));
                }
                base
            }
            None => None,
        };
        let name = self.identifier(&class.name.id, class.name.range);
        let outer = (std::mem::replace(&mut self.in_function, false), std::mem::take(&mut self.loop_depth));
        let body = self.parse_statements(class.body);
        (self.in_function, self.loop_depth) = outer;
        let body = body?;
        Ok(Node::ClassDef(Box::new(ClassDef { name, base, body })))
    }

    fn parse_loop_body(&mut self, body: Vec<Stmt>) -> Result<Vec<StmtLoc>, ParseError> {
        self.loop_depth += 1;
        let result = self.parse_statements(body);
        self.loop_depth -= 1;
        result
    }

    fn parse_elif_else_clauses(&mut self, clauses: Vec<ElifElseClause>) -> Result<Vec<StmtLoc>, ParseError> {
        let mut tail: Vec<StmtLoc> = Vec::new();
        for clause in clauses.into_iter().rev() {
            match clause.test {
                Some(test) => {
                    let position = self.convert_range(clause.range);
                    let test = self.parse_expression(test)?;
                    let body = self.parse_statements(clause.body)?;
                    let nested = Node::If {
                        test,
                        body,
                        or_else: tail,
                    };
                    tail = vec![StmtLoc::new(position, nested)];
                }
                None => {
                    tail = self.parse_statements(clause.body)?;
                }
            }
        }
        Ok(tail)
    }

    /// Handles `x = value` and chained assignments.
    ///
    /// A chain keeps its targets in source order; the value is evaluated once and
    /// stored to each of them from left to right.
    fn parse_assign_statement(
        &mut self,
        targets: Vec<AstExpr>,
        rhs: AstExpr,
        position: CodeRange,
    ) -> Result<Node, ParseError> {
        let rhs = self.parse_expression(rhs)?;
        if targets.len() == 1 {
            let target = targets
                .into_iter()
                .next()
                .ok_or_else(|| ParseError::syntax("missing assignment target", position))?;
            return self.parse_assignment(target, rhs);
        }
        let targets = targets
            .into_iter()
            .map(|target| self.parse_assign_target(target))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::ChainAssign { targets, object: rhs })
    }

    /// Builds the assignment of an already parsed right-hand side to `lhs`.
    fn parse_assignment(&mut self, lhs: AstExpr, rhs: ExprLoc) -> Result<Node, ParseError> {
        Ok(match self.parse_assign_target(lhs)? {
            AssignTarget::Name(target) => Node::Assign { target, object: rhs },
            AssignTarget::Attr { object, attr } => Node::AttrAssign {
                object,
                attr,
                value: rhs,
            },
            AssignTarget::Subscript { object, index } => Node::SubscriptAssign {
                target: object,
                index,
                value: rhs,
            },
            AssignTarget::Unpack { targets, position } => Node::UnpackAssign {
                targets,
                targets_position: position,
                object: rhs,
            },
        })
    }

    fn parse_assign_target(&mut self, lhs: AstExpr) -> Result<AssignTarget, ParseError> {
        match lhs {
            AstExpr::Name(ast::ExprName { id, range, .. }) => Ok(AssignTarget::Name(self.identifier(&id, range))),
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Ok(AssignTarget::Subscript {
                object: self.parse_expression(*value)?,
                index: self.parse_index(*slice)?,
            }),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Ok(AssignTarget::Attr {
                object: self.parse_expression(*value)?,
                attr: self.interner.intern(attr.as_str()),
            }),
            AstExpr::Tuple(ast::ExprTuple { elts, range, .. }) | AstExpr::List(ast::ExprList { elts, range, .. }) => {
                let position = self.convert_range(range);
                let targets = elts
                    .into_iter()
                    .map(|e| self.parse_unpack_target(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(AssignTarget::Unpack { targets, position })
            }
            other => Err(ParseError::syntax(
                "cannot assign to expression",
                self.convert_range(other.range()),
            )),
        }
    }

    /// Parses an unpack target: a name or a nested tuple/list of targets.
    ///
    /// Includes depth tracking to prevent stack overflow from deeply nested structures.
    fn parse_unpack_target(&mut self, ast: AstExpr) -> Result<UnpackTarget, ParseError> {
        self.decr_depth_remaining(|| ast.range())?;
        let result = self.parse_unpack_target_impl(ast);
        self.depth_remaining += 1;
        result
    }

    fn parse_unpack_target_impl(&mut self, ast: AstExpr) -> Result<UnpackTarget, ParseError> {
        match ast {
            AstExpr::Name(ast::ExprName { id, range, .. }) => Ok(UnpackTarget::Name(self.identifier(&id, range))),
            AstExpr::Tuple(ast::ExprTuple { elts, range, .. }) | AstExpr::List(ast::ExprList { elts, range, .. }) => {
                let position = self.convert_range(range);
                let targets = elts
                    .into_iter()
                    .map(|e| self.parse_unpack_target(e))
                    .collect::<Result<Vec<_>, _>>()?;
                if targets.is_empty() {
                    return Err(ParseError::syntax("empty tuple in unpack target", position));
                }
                Ok(UnpackTarget::Tuple { targets, position })
            }
            AstExpr::Starred(s) => Err(ParseError::not_implemented("starred assignment targets", self.convert_range(s.range))),
            other => Err(ParseError::not_implemented(
                "unpacking into attributes or subscripts",
                self.convert_range(other.range()),
            )),
        }
    }

    /// Parses the index of a subscript, rejecting slices.
    fn parse_index(&mut self, slice: AstExpr) -> Result<ExprLoc, ParseError> {
        if let AstExpr::Slice(s) = &slice {
            return Err(ParseError::not_implemented("slices", self.convert_range(s.range)));
        }
        self.parse_expression(slice)
    }

    /// Parses an expression from the ruff AST.
    ///
    /// Includes depth tracking to prevent stack overflow from deeply nested structures.
    fn parse_expression(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        self.decr_depth_remaining(|| expression.range())?;
        let result = self.parse_expression_impl(expression);
        self.depth_remaining += 1;
        result
    }

    fn parse_expression_impl(&mut self, expression: AstExpr) -> Result<ExprLoc, ParseError> {
        let position = self.convert_range(expression.range());
        let expr = match expression {
            AstExpr::BoolOp(ast::ExprBoolOp { op, values, .. }) => {
                // `a and b and c` right-folds into `a and (b and c)`
                let op = convert_bool_op(op);
                let mut values = values.into_iter().rev();
                let last = values
                    .next()
                    .ok_or_else(|| ParseError::syntax("empty boolean operation", position))?;
                let mut result = self.parse_expression(last)?;
                for value in values {
                    let left = Box::new(self.parse_expression(value)?);
                    result = ExprLoc::new(
                        position,
                        Expr::Op {
                            left,
                            op,
                            right: Box::new(result),
                        },
                    );
                }
                return Ok(result);
            }
            AstExpr::BinOp(ast::ExprBinOp { left, op, right, .. }) => Expr::Op {
                left: Box::new(self.parse_expression(*left)?),
                op: convert_op(op, position)?,
                right: Box::new(self.parse_expression(*right)?),
            },
            AstExpr::UnaryOp(ast::ExprUnaryOp { op, operand, .. }) => {
                let operand = Box::new(self.parse_expression(*operand)?);
                match op {
                    UnaryOp::Not => Expr::Not(operand),
                    UnaryOp::USub => Expr::UnaryMinus(operand),
                    UnaryOp::UAdd => Expr::UnaryPlus(operand),
                    UnaryOp::Invert => return Err(ParseError::not_implemented("the '~' operator", position)),
                }
            }
            AstExpr::If(ast::ExprIf { test, body, orelse, .. }) => Expr::IfElse {
                test: Box::new(self.parse_expression(*test)?),
                body: Box::new(self.parse_expression(*body)?),
                orelse: Box::new(self.parse_expression(*orelse)?),
            },
            AstExpr::Dict(ast::ExprDict { items, .. }) => {
                let mut pairs = Vec::with_capacity(items.len());
                for ast::DictItem { key, value } in items {
                    let Some(key) = key else {
                        return Err(ParseError::not_implemented("dict unpacking (**)", position));
                    };
                    pairs.push((self.parse_expression(key)?, self.parse_expression(value)?));
                }
                Expr::Dict(pairs)
            }
            AstExpr::Set(ast::ExprSet { elts, .. }) => Expr::Set(self.parse_elements(elts, position)?),
            AstExpr::List(ast::ExprList { elts, .. }) => Expr::List(self.parse_elements(elts, position)?),
            AstExpr::Tuple(ast::ExprTuple { elts, .. }) => Expr::Tuple(self.parse_elements(elts, position)?),
            AstExpr::Compare(ast::ExprCompare {
                left,
                ops,
                comparators,
                ..
            }) => {
                let left = Box::new(self.parse_expression(*left)?);
                let mut comparisons = ops
                    .into_vec()
                    .into_iter()
                    .zip(comparators.into_vec())
                    .map(|(op, right)| Ok((convert_compare_op(op), self.parse_expression(right)?)))
                    .collect::<Result<Vec<_>, ParseError>>()?;
                // single comparison (most common)
                if comparisons.len() == 1
                    && let Some((op, right)) = comparisons.pop()
                {
                    Expr::CmpOp {
                        left,
                        op,
                        right: Box::new(right),
                    }
                } else {
                    Expr::ChainCmp { left, comparisons }
                }
            }
            AstExpr::Call(ast::ExprCall { func, arguments, .. }) => {
                let ast::Arguments { args, keywords, .. } = arguments;
                let mut positional = Vec::with_capacity(args.len());
                for arg in args.into_vec() {
                    if let AstExpr::Starred(_) = arg {
                        return Err(ParseError::not_implemented("starred arguments (*args)", position));
                    }
                    positional.push(self.parse_expression(arg)?);
                }
                let mut kwargs = Vec::with_capacity(keywords.len());
                for keyword in keywords.into_vec() {
                    let Some(key) = keyword.arg else {
                        return Err(ParseError::not_implemented("keyword unpacking (**kwargs)", position));
                    };
                    let key = self.identifier(&key.id, key.range);
                    kwargs.push(Kwarg {
                        key,
                        value: self.parse_expression(keyword.value)?,
                    });
                }
                let args = Box::new(ArgExprs::new(positional, kwargs));
                match *func {
                    AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::AttrCall {
                        object: Box::new(self.parse_expression(*value)?),
                        attr: self.interner.intern(attr.as_str()),
                        args,
                    },
                    other => Expr::Call {
                        callable: Box::new(self.parse_expression(other)?),
                        args,
                    },
                }
            }
            AstExpr::StringLiteral(ast::ExprStringLiteral { value, .. }) => {
                Expr::Literal(Literal::Str(self.interner.intern(value.to_str())))
            }
            AstExpr::NumberLiteral(ast::ExprNumberLiteral { value, .. }) => match value {
                Number::Int(i) => match i.as_i64() {
                    Some(i) => Expr::Literal(Literal::Int(i)),
                    None => {
                        return Err(ParseError::not_implemented(
                            "integer literals outside the 64-bit range",
                            position,
                        ));
                    }
                },
                Number::Float(f) => Expr::Literal(Literal::Float(f)),
                Number::Complex { .. } => return Err(ParseError::not_implemented("complex numbers", position)),
            },
            AstExpr::BooleanLiteral(ast::ExprBooleanLiteral { value, .. }) => Expr::Literal(Literal::Bool(value)),
            AstExpr::NoneLiteral(_) => Expr::Literal(Literal::None),
            AstExpr::Attribute(ast::ExprAttribute { value, attr, .. }) => Expr::AttrGet {
                object: Box::new(self.parse_expression(*value)?),
                attr: self.interner.intern(attr.as_str()),
            },
            AstExpr::Subscript(ast::ExprSubscript { value, slice, .. }) => Expr::Subscript {
                object: Box::new(self.parse_expression(*value)?),
                index: Box::new(self.parse_index(*slice)?),
            },
            AstExpr::Name(ast::ExprName { id, range, .. }) => Expr::Name(self.identifier(&id, range)),
            other => return Err(ParseError::not_implemented(unsupported_expression(&other), position)),
        };
        Ok(ExprLoc::new(position, expr))
    }

    /// Parses the elements of a list, tuple or set display.
    fn parse_elements(&mut self, elts: Vec<AstExpr>, position: CodeRange) -> Result<Vec<ExprLoc>, ParseError> {
        if elts.iter().any(|e| matches!(e, AstExpr::Starred(_))) {
            return Err(ParseError::not_implemented("starred expressions (*expr)", position));
        }
        elts.into_iter().map(|e| self.parse_expression(e)).collect()
    }

    fn identifier(&mut self, id: &Name, range: TextRange) -> Identifier {
        let string_id = self.interner.intern(id);
        Identifier::new(string_id, self.convert_range(range))
    }

    fn convert_range(&self, range: TextRange) -> CodeRange {
        let (start_line, start_column) = self.index_to_position(range.start().into());
        let (end_line, end_column) = self.index_to_position(range.end().into());
        // store line number for single-line ranges, None for multi-line
        let preview_line = (start_line == end_line).then(|| u32::try_from(start_line).unwrap_or(u32::MAX));
        CodeRange::new(
            self.filename_id,
            CodeLoc::new(start_line, start_column),
            CodeLoc::new(end_line, end_column),
            preview_line,
        )
    }

    /// 0-indexed line and character column of a byte offset.
    fn index_to_position(&self, index: usize) -> (usize, usize) {
        let line = self.line_starts.partition_point(|&start| start <= index).saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(0);
        let column = self.code.get(line_start..index).map_or(0, |s| s.chars().count());
        (line, column)
    }

    /// Decrements the depth remaining for nested structures.
    /// Returns an error if the depth remaining goes to zero.
    fn decr_depth_remaining(&mut self, get_range: impl FnOnce() -> TextRange) -> Result<(), ParseError> {
        if let Some(depth_remaining) = self.depth_remaining.checked_sub(1) {
            self.depth_remaining = depth_remaining;
            Ok(())
        } else {
            let position = self.convert_range(get_range());
            Err(ParseError::syntax("too many nested parentheses", position))
        }
    }
}

/// Describes an expression kind the evaluator does not support.
fn unsupported_expression(expr: &AstExpr) -> &'static str {
    match expr {
        AstExpr::Named(_) => "assignment expressions (:=)",
        AstExpr::Lambda(_) => "lambda expressions",
        AstExpr::ListComp(_) | AstExpr::SetComp(_) | AstExpr::DictComp(_) => "comprehensions",
        AstExpr::Generator(_) | AstExpr::Yield(_) | AstExpr::YieldFrom(_) => "generators",
        AstExpr::Await(_) => "await expressions",
        AstExpr::FString(_) => "f-strings",
        AstExpr::TString(_) => "template strings (t-strings)",
        AstExpr::BytesLiteral(_) => "bytes literals",
        AstExpr::EllipsisLiteral(_) => "the ellipsis literal",
        AstExpr::Starred(_) => "starred expressions (*expr)",
        AstExpr::Slice(_) => "slices",
        _ => "this expression",
    }
}

fn convert_op(op: AstOperator, position: CodeRange) -> Result<Operator, ParseError> {
    match op {
        AstOperator::Add => Ok(Operator::Add),
        AstOperator::Sub => Ok(Operator::Sub),
        AstOperator::Mult => Ok(Operator::Mult),
        AstOperator::Div => Ok(Operator::Div),
        AstOperator::FloorDiv => Ok(Operator::FloorDiv),
        AstOperator::Mod => Ok(Operator::Mod),
        AstOperator::Pow => Ok(Operator::Pow),
        AstOperator::MatMult => Err(ParseError::not_implemented("the '@' operator", position)),
        AstOperator::LShift
        | AstOperator::RShift
        | AstOperator::BitOr
        | AstOperator::BitXor
        | AstOperator::BitAnd => Err(ParseError::not_implemented("bitwise operators", position)),
    }
}

fn convert_bool_op(op: BoolOp) -> Operator {
    match op {
        BoolOp::And => Operator::And,
        BoolOp::Or => Operator::Or,
    }
}

fn convert_compare_op(op: CmpOp) -> CmpOperator {
    match op {
        CmpOp::Eq => CmpOperator::Eq,
        CmpOp::NotEq => CmpOperator::NotEq,
        CmpOp::Lt => CmpOperator::Lt,
        CmpOp::LtE => CmpOperator::LtE,
        CmpOp::Gt => CmpOperator::Gt,
        CmpOp::GtE => CmpOperator::GtE,
        CmpOp::Is => CmpOperator::Is,
        CmpOp::IsNot => CmpOperator::IsNot,
        CmpOp::In => CmpOperator::In,
        CmpOp::NotIn => CmpOperator::NotIn,
    }
}

/// Source code location information for error reporting.
///
/// Contains filename (as StringId), line/column positions, and optionally a line number for
/// extracting the preview line from source during traceback formatting.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeRange {
    /// Interned filename ID - look up in Interns to get the actual string.
    pub filename: StringId,
    /// Line number (0-indexed) for extracting preview from source. None if range spans multiple lines.
    preview_line: Option<u32>,
    start: CodeLoc,
    end: CodeLoc,
}

/// Custom Debug implementation to make displaying code much less verbose.
impl fmt::Debug for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CodeRange{{filename: {:?}, start: {:?}, end: {:?}}}",
            self.filename, self.start, self.end
        )
    }
}

impl CodeRange {
    #[must_use]
    pub const fn new(filename: StringId, start: CodeLoc, end: CodeLoc, preview_line: Option<u32>) -> Self {
        Self {
            filename,
            preview_line,
            start,
            end,
        }
    }

    #[must_use]
    pub fn start(&self) -> CodeLoc {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> CodeLoc {
        self.end
    }

    /// 1-based line the range starts on.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.start.line
    }

    /// Returns the preview line number (0-indexed) if available.
    #[must_use]
    pub fn preview_line_number(&self) -> Option<u32> {
        self.preview_line
    }
}

/// Errors that can occur while parsing source code.
#[derive(Debug, Clone)]
pub enum ParseError {
    /// Error in syntax
    Syntax {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
    /// Valid Python that the interpreter does not support.
    /// Message gets prefixed with "nanopy does not support ".
    NotImplemented {
        msg: Cow<'static, str>,
        position: CodeRange,
    },
}

impl ParseError {
    pub(crate) fn not_implemented(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::NotImplemented {
            msg: msg.into(),
            position,
        }
    }

    pub(crate) fn syntax(msg: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self::Syntax {
            msg: msg.into(),
            position,
        }
    }

    /// Converts this parser error into a Python exception with source location.
    pub fn into_python_exc(self, filename: &str, source: &str) -> Exception {
        let (exc_type, message, position) = match self {
            Self::Syntax { msg, position } => (ExcType::SyntaxError, msg.into_owned(), position),
            Self::NotImplemented { msg, position } => (
                ExcType::NotImplementedError,
                format!("nanopy does not support {msg}"),
                position,
            ),
        };
        let frame = StackFrame::from_position(position, filename, source);
        Exception::new_full(exc_type, Some(message), vec![frame])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(code: &str) -> ParseResult {
        parse(code, "test.py").unwrap()
    }

    fn parse_err(code: &str) -> Exception {
        parse(code, "test.py").unwrap_err().into_python_exc("test.py", code)
    }

    #[test]
    fn functions_go_to_the_table() {
        let result = parse_ok("def outer(a, b=2):\n    def inner():\n        return a\n    return inner\n");
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.functions.len(), 2);
        assert!(matches!(result.nodes[0].node, Node::FunctionDef(id) if id.index() == 1));
        let outer = &result.functions[1];
        assert_eq!(outer.params.len(), 2);
        assert_eq!(outer.required_count(), 1);
    }

    #[test]
    fn chained_assignment_keeps_targets_in_order() {
        let result = parse_ok("a = b.x = c[0] = 10\n");
        let Node::ChainAssign { targets, object } = &result.nodes[0].node else {
            panic!("expected a chained assignment, got {:?}", result.nodes[0].node);
        };
        assert!(matches!(object.expr, Expr::Literal(Literal::Int(10))));
        assert_eq!(targets.len(), 3);
        assert!(matches!(targets[0], AssignTarget::Name(_)));
        assert!(matches!(targets[1], AssignTarget::Attr { .. }));
        assert!(matches!(targets[2], AssignTarget::Subscript { .. }));
    }

    #[test]
    fn annotated_assignment_binds_without_evaluating_annotation() {
        let result = parse_ok("x: int = 5\ny: undefined_type\n");
        assert!(matches!(
            &result.nodes[0].node,
            Node::Assign { object, .. } if matches!(object.expr, Expr::Literal(Literal::Int(5)))
        ));
        assert!(matches!(result.nodes[1].node, Node::Pass));
    }

    #[test]
    fn positions_are_one_based_lines_and_columns() {
        let result = parse_ok("x = 1\n\n  \ny = 'é' + z\n");
        let position = result.nodes[1].position;
        assert_eq!(position.start(), CodeLoc { line: 4, column: 1 });
        assert_eq!(position.end(), CodeLoc { line: 4, column: 12 });
        assert_eq!(position.preview_line_number(), Some(3));
    }

    #[test]
    fn unsupported_syntax_is_not_implemented() {
        for (code, message) in [
            ("f = lambda: 1\n", "nanopy does not support lambda expressions"),
            ("x = [i for i in y]\n", "nanopy does not support comprehensions"),
            ("x = y[1:2]\n", "nanopy does not support slices"),
            ("class A(B, C):\n    pass\n", "nanopy does not support multiple inheritance"),
            ("import os\n", "nanopy does not support imports"),
        ] {
            let exc = parse_err(code);
            assert_eq!(exc.exc_type(), ExcType::NotImplementedError, "{code}");
            assert_eq!(exc.message(), Some(message), "{code}");
        }
    }

    #[test]
    fn syntax_errors_point_at_the_source() {
        let exc = parse_err("x = (1,\n");
        assert_eq!(exc.exc_type(), ExcType::SyntaxError);
        assert_eq!(exc.traceback()[0].filename, "test.py");
    }

    #[test]
    fn misplaced_control_flow_is_a_syntax_error() {
        for (code, message) in [
            ("return 1\n", "'return' outside function"),
            ("break\n", "'break' outside loop"),
            ("while x:\n    def f():\n        continue\n", "'continue' not properly in loop"),
        ] {
            let exc = parse_err(code);
            assert_eq!(exc.exc_type(), ExcType::SyntaxError, "{code}");
            assert_eq!(exc.message(), Some(message), "{code}");
        }
        parse_ok("for x in y:\n    if x:\n        break\n");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let depth = usize::from(MAX_NESTING_DEPTH) + 5;
        let code = format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        let exc = parse_err(&code);
        assert_eq!(exc.message(), Some("too many nested parentheses"));
    }
}
