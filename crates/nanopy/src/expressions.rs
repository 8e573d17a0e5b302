use strum::IntoStaticStr;

use crate::{
    args::ArgExprs,
    intern::{FunctionId, StringId},
    parse::CodeRange,
    value::Value,
};

/// An identifier (variable, parameter, function or class name) with its source location.
///
/// The name is stored as a `StringId`; look it up in the `Interns` table to get the text.
#[derive(Debug, Clone, Copy)]
pub struct Identifier {
    pub position: CodeRange,
    pub name_id: StringId,
}

impl Identifier {
    pub fn new(name_id: StringId, position: CodeRange) -> Self {
        Self { position, name_id }
    }
}

/// Values that are known at parse time.
///
/// Literals are detached from the heap; they only become runtime [`Value`]s when
/// evaluated, and none of them needs an allocation.
#[derive(Debug, Clone, Copy)]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// An interned string literal.
    Str(StringId),
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::None => Self::None,
            Literal::Bool(b) => Self::Bool(b),
            Literal::Int(v) => Self::Int(v),
            Literal::Float(v) => Self::Float(v),
            Literal::Str(string_id) => Self::InternString(string_id),
        }
    }
}

/// An expression in the tree.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Name(Identifier),
    List(Vec<ExprLoc>),
    Tuple(Vec<ExprLoc>),
    Set(Vec<ExprLoc>),
    Dict(Vec<(ExprLoc, ExprLoc)>),
    /// Binary arithmetic, or short-circuiting `and`/`or`.
    Op {
        left: Box<ExprLoc>,
        op: Operator,
        right: Box<ExprLoc>,
    },
    CmpOp {
        left: Box<ExprLoc>,
        op: CmpOperator,
        right: Box<ExprLoc>,
    },
    /// `a < b < c`: each operand is evaluated at most once and evaluation stops
    /// at the first false comparison.
    ChainCmp {
        left: Box<ExprLoc>,
        comparisons: Vec<(CmpOperator, ExprLoc)>,
    },
    Not(Box<ExprLoc>),
    UnaryMinus(Box<ExprLoc>),
    UnaryPlus(Box<ExprLoc>),
    /// Conditional expression `body if test else orelse`; the branch not taken is never evaluated.
    IfElse {
        test: Box<ExprLoc>,
        body: Box<ExprLoc>,
        orelse: Box<ExprLoc>,
    },
    /// Call of an arbitrary callable expression, most commonly a name.
    Call {
        callable: Box<ExprLoc>,
        args: Box<ArgExprs>,
    },
    /// Method call `obj.method(args)`.
    ///
    /// Kept separate from `Call` so calling a method never needs to allocate a bound method.
    AttrCall {
        object: Box<ExprLoc>,
        attr: StringId,
        args: Box<ArgExprs>,
    },
    AttrGet {
        object: Box<ExprLoc>,
        attr: StringId,
    },
    Subscript {
        object: Box<ExprLoc>,
        index: Box<ExprLoc>,
    },
}

/// An expression with its source location.
#[derive(Debug, Clone)]
pub struct ExprLoc {
    pub position: CodeRange,
    pub expr: Expr,
}

impl ExprLoc {
    pub fn new(position: CodeRange, expr: Expr) -> Self {
        Self { position, expr }
    }
}

/// Target of a tuple-unpacking assignment or a `for` loop.
#[derive(Debug, Clone)]
pub enum UnpackTarget {
    Name(Identifier),
    /// Nested tuple such as `(a, b)` in `(a, b), c = value`.
    Tuple {
        targets: Vec<UnpackTarget>,
        position: CodeRange,
    },
}

/// One target of a chained assignment such as `a = obj.x = items[0] = value`.
#[derive(Debug, Clone)]
pub enum AssignTarget {
    Name(Identifier),
    Attr { object: ExprLoc, attr: StringId },
    Subscript { object: ExprLoc, index: ExprLoc },
    Unpack {
        targets: Vec<UnpackTarget>,
        position: CodeRange,
    },
}

/// A statement.
#[derive(Debug, Clone, IntoStaticStr)]
pub enum Node {
    Pass,
    Expr(ExprLoc),
    Return(ExprLoc),
    ReturnNone,
    Assign {
        target: Identifier,
        object: ExprLoc,
    },
    UnpackAssign {
        targets: Vec<UnpackTarget>,
        targets_position: CodeRange,
        object: ExprLoc,
    },
    /// `a = b = value`: `object` is evaluated once and stored to each target in order.
    ChainAssign {
        targets: Vec<AssignTarget>,
        object: ExprLoc,
    },
    /// `x += value`
    OpAssign {
        target: Identifier,
        op: Operator,
        object: ExprLoc,
    },
    /// `obj.attr += value`, with `obj` evaluated once.
    OpAssignAttr {
        object: ExprLoc,
        attr: StringId,
        op: Operator,
        value: ExprLoc,
    },
    /// `obj[key] += value`, with `obj` and `key` evaluated once.
    OpAssignSubscr {
        object: ExprLoc,
        index: ExprLoc,
        op: Operator,
        value: ExprLoc,
    },
    SubscriptAssign {
        target: ExprLoc,
        index: ExprLoc,
        value: ExprLoc,
    },
    AttrAssign {
        object: ExprLoc,
        attr: StringId,
        value: ExprLoc,
    },
    For {
        target: UnpackTarget,
        iter: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    While {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    If {
        test: ExprLoc,
        body: Vec<StmtLoc>,
        or_else: Vec<StmtLoc>,
    },
    /// A `def`; the body lives in the function definitions table.
    FunctionDef(FunctionId),
    ClassDef(Box<ClassDef>),
    Global(Vec<StringId>),
    Nonlocal(Vec<StringId>),
    Break,
    Continue,
}

/// A statement with the source range it was parsed from.
#[derive(Debug, Clone)]
pub struct StmtLoc {
    pub position: CodeRange,
    pub node: Node,
}

impl Node {
    /// Variant name, reported to tracers for each executed statement.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl StmtLoc {
    pub fn new(position: CodeRange, node: Node) -> Self {
        Self { position, node }
    }
}

/// A `class` statement with at most one base class.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Identifier,
    pub base: Option<ExprLoc>,
    pub body: Vec<StmtLoc>,
}

/// Binary operators, including the boolean `and`/`or`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mult,
    Div,
    FloorDiv,
    Mod,
    Pow,
    And,
    Or,
}

impl Operator {
    /// The operator symbol, as it appears in `TypeError` messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Defined separately since these operators always return a bool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOperator {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CmpOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}
