use std::{borrow::Cow, fmt};

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    exception_public::{Exception, StackFrame},
    intern::{Interns, StringId},
    parse::CodeRange,
};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Exception types raised by the interpreter.
///
/// The string form of each variant is its name (`ValueError` -> "ValueError").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, serde::Serialize, serde::Deserialize,
)]
pub enum ExcType {
    /// Reference to a name bound in no scope.
    NameError,
    /// Operator or call applied to values of the wrong kind.
    TypeError,
    /// Missing attribute or method, including failed lookups through the class chain.
    AttributeError,
    ValueError,
    IndexError,
    KeyError,
    ZeroDivisionError,
    OverflowError,
    RecursionError,
    /// The heap could not grow within its configured limits.
    MemoryError,
    TimeoutError,
    SyntaxError,
    NotImplementedError,
    RuntimeError,
    /// `input()` found no more lines to read.
    EOFError,
    /// Raised by `exit()`; the message holds the exit status.
    SystemExit,
}

impl ExcType {
    #[must_use]
    pub(crate) fn name_error(name: &str) -> SimpleException {
        SimpleException::new_msg(Self::NameError, format!("name '{name}' is not defined"))
    }

    #[must_use]
    pub(crate) fn attribute_error(type_name: impl fmt::Display, attr: &str) -> RunError {
        SimpleException::new_msg(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error(msg: impl fmt::Display) -> RunError {
        SimpleException::new_msg(Self::TypeError, msg).into()
    }

    /// `unsupported operand type(s) for {op}: '{left}' and '{right}'`, or the
    /// concatenation message CPython uses for `str + x` and `list + x`.
    #[must_use]
    pub(crate) fn binary_type_error(op: &str, lhs_type: &str, rhs_type: &str) -> RunError {
        let message = if op == "+" && matches!(lhs_type, "str" | "list" | "tuple") {
            format!("can only concatenate {lhs_type} (not \"{rhs_type}\") to {lhs_type}")
        } else {
            format!("unsupported operand type(s) for {op}: '{lhs_type}' and '{rhs_type}'")
        };
        SimpleException::new_msg(Self::TypeError, message).into()
    }

    #[must_use]
    pub(crate) fn compare_type_error(op: &str, lhs_type: &str, rhs_type: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{op}' not supported between instances of '{lhs_type}' and '{rhs_type}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn unary_type_error(op: &str, value_type: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("bad operand type for unary {op}: '{value_type}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_unhashable(type_: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("unhashable type: '{type_}'")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_callable(type_: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not callable")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_iterable(type_: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not iterable")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_sub(type_: &str) -> RunError {
        SimpleException::new_msg(Self::TypeError, format!("'{type_}' object is not subscriptable")).into()
    }

    #[must_use]
    pub(crate) fn type_error_not_sub_assignment(type_: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("'{type_}' object does not support item assignment"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_indices(type_: &str, index_type: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{type_} indices must be integers, not '{index_type}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn index_error(type_: &str) -> RunError {
        SimpleException::new_msg(Self::IndexError, format!("{type_} index out of range")).into()
    }

    #[must_use]
    pub(crate) fn key_error(key_repr: String) -> RunError {
        SimpleException::new_msg(Self::KeyError, key_repr).into()
    }

    #[must_use]
    pub(crate) fn zero_division(msg: &str) -> RunError {
        SimpleException::new_msg(Self::ZeroDivisionError, msg).into()
    }

    #[must_use]
    pub(crate) fn overflow() -> RunError {
        SimpleException::new_msg(Self::OverflowError, "integer result out of range").into()
    }

    /// `f() takes 2 positional arguments but 3 were given`, or
    /// `f() takes from 1 to 2 positional arguments but 3 were given` when some have defaults.
    #[must_use]
    pub(crate) fn type_error_too_many_positional(name: &str, min: usize, max: usize, given: usize) -> RunError {
        let takes = if min == max {
            if max == 1 {
                "1 positional argument".to_owned()
            } else {
                format!("{max} positional arguments")
            }
        } else {
            format!("from {min} to {max} positional arguments")
        };
        let were = if given == 1 { "was" } else { "were" };
        SimpleException::new_msg(Self::TypeError, format!("{name}() takes {takes} but {given} {were} given")).into()
    }

    /// `f() missing 2 required positional arguments: 'a' and 'b'`
    #[must_use]
    pub(crate) fn type_error_missing_positional(name: &str, missing: &[&str]) -> RunError {
        let plural = if missing.len() == 1 { "argument" } else { "arguments" };
        SimpleException::new_msg(
            Self::TypeError,
            format!(
                "{name}() missing {} required positional {plural}: {}",
                missing.len(),
                format_param_names(missing)
            ),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_unexpected_keyword(name: &str, key: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got an unexpected keyword argument '{key}'"),
        )
        .into()
    }

    #[must_use]
    pub(crate) fn type_error_multiple_values(name: &str, key: &str) -> RunError {
        SimpleException::new_msg(
            Self::TypeError,
            format!("{name}() got multiple values for argument '{key}'"),
        )
        .into()
    }
}

/// An exception type plus its optional message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SimpleException {
    exc_type: ExcType,
    arg: Option<String>,
}

impl SimpleException {
    #[must_use]
    pub fn new(exc_type: ExcType, arg: Option<String>) -> Self {
        Self { exc_type, arg }
    }

    #[must_use]
    pub fn new_msg(exc_type: ExcType, arg: impl fmt::Display) -> Self {
        Self {
            exc_type,
            arg: Some(arg.to_string()),
        }
    }

    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    pub fn arg(&self) -> Option<&String> {
        self.arg.as_ref()
    }

    pub(crate) fn with_frame(self, frame: RawStackFrame) -> ExceptionRaise {
        ExceptionRaise {
            exc: self,
            frame: Some(frame),
        }
    }
}

/// A raised exception with the frames it has propagated through.
#[derive(Debug, Clone)]
pub(crate) struct ExceptionRaise {
    pub exc: SimpleException,
    /// Innermost frame first; each `parent` is the caller of the frame before it.
    pub frame: Option<RawStackFrame>,
}

impl From<SimpleException> for ExceptionRaise {
    fn from(exc: SimpleException) -> Self {
        Self { exc, frame: None }
    }
}

impl ExceptionRaise {
    /// Adds a caller's frame as the outermost frame in the traceback chain.
    pub(crate) fn add_caller_frame(&mut self, position: CodeRange, name: StringId) {
        let caller = RawStackFrame::new(position, name);
        match &mut self.frame {
            Some(frame) => frame.push_outermost(caller),
            None => self.frame = Some(caller),
        }
    }

    /// Converts this exception to an [`Exception`] for the public API.
    #[must_use]
    pub fn into_python_exception(self, interns: &Interns, source: &str) -> Exception {
        let mut traceback = Vec::new();
        let mut current = self.frame.as_ref();
        while let Some(frame) = current {
            traceback.push(StackFrame::from_raw(frame, interns, source));
            current = frame.parent.as_deref();
        }
        // most recent call last
        traceback.reverse();
        Exception::new_full(self.exc.exc_type(), self.exc.arg().cloned(), traceback)
    }
}

/// A stack frame recorded while an exception propagates.
#[derive(Debug, Clone)]
pub(crate) struct RawStackFrame {
    pub position: CodeRange,
    pub frame_name: StringId,
    pub parent: Option<Box<Self>>,
}

impl RawStackFrame {
    pub(crate) fn new(position: CodeRange, frame_name: StringId) -> Self {
        Self {
            position,
            frame_name,
            parent: None,
        }
    }

    fn push_outermost(&mut self, caller: Self) {
        match &mut self.parent {
            Some(parent) => parent.push_outermost(caller),
            None => self.parent = Some(Box::new(caller)),
        }
    }
}

/// Runtime error types that can occur during execution.
///
/// - `Internal`: bug in the interpreter, not in user code
/// - `Exc`: an ordinary runtime error such as `TypeError`
/// - `UncatchableExc`: resource exhaustion (memory, time); always aborts the run
#[derive(Debug)]
pub(crate) enum RunError {
    Internal(Cow<'static, str>),
    Exc(Box<ExceptionRaise>),
    UncatchableExc(Box<ExceptionRaise>),
}

impl From<ExceptionRaise> for RunError {
    fn from(exc: ExceptionRaise) -> Self {
        Self::Exc(Box::new(exc))
    }
}

impl From<SimpleException> for RunError {
    fn from(exc: SimpleException) -> Self {
        Self::Exc(Box::new(exc.into()))
    }
}

/// Errors surfaced by host callbacks such as a [`PrintWriter`](crate::io::PrintWriter).
impl From<Exception> for RunError {
    fn from(exc: Exception) -> Self {
        let exc_type = exc.exc_type();
        SimpleException::new(exc_type, exc.into_message()).into()
    }
}

impl RunError {
    #[must_use]
    pub fn into_python_exception(self, interns: &Interns, source: &str) -> Exception {
        match self {
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.into_python_exception(interns, source),
            Self::Internal(err) => Exception::new(ExcType::RuntimeError, Some(format!("Internal error in nanopy: {err}"))),
        }
    }

    pub fn internal(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(msg.into())
    }

    /// Records that this error propagated out of the frame `name`, last seen at `position`.
    pub(crate) fn add_caller_frame(&mut self, position: CodeRange, name: StringId) {
        match self {
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.add_caller_frame(position, name),
            Self::Internal(_) => {}
        }
    }

    /// Returns true if this error is an exception of `exc_type`.
    pub fn is_exception_type(&self, exc_type: ExcType) -> bool {
        match self {
            Self::Exc(exc) | Self::UncatchableExc(exc) => exc.exc.exc_type() == exc_type,
            Self::Internal(_) => false,
        }
    }
}

/// Formats parameter names for error messages: `'a'`, `'a' and 'b'`, `'a', 'b' and 'c'`.
fn format_param_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => format!("'{only}'"),
        [rest @ .., last] => {
            let rest: Vec<_> = rest.iter().map(|n| format!("'{n}'")).collect();
            format!("{} and '{last}'", rest.join(", "))
        }
    }
}
