//! Call arguments, both as parsed expressions and as evaluated values.

use smallvec::SmallVec;

use crate::{
    exception_private::{ExcType, RunResult, SimpleException},
    expressions::{ExprLoc, Identifier},
    intern::{Interns, StringId},
    value::Value,
};

/// A `key=value` argument in a call expression.
#[derive(Debug, Clone)]
pub struct Kwarg {
    pub key: Identifier,
    pub value: ExprLoc,
}

/// Unevaluated arguments of a call expression.
#[derive(Debug, Clone, Default)]
pub struct ArgExprs {
    pub args: Vec<ExprLoc>,
    pub kwargs: Vec<Kwarg>,
}

impl ArgExprs {
    pub fn new(args: Vec<ExprLoc>, kwargs: Vec<Kwarg>) -> Self {
        Self { args, kwargs }
    }
}

/// Evaluated call arguments.
///
/// Most calls pass a handful of arguments, so both lists live inline until they spill.
#[derive(Debug, Clone, Default)]
pub struct ArgValues {
    pub args: SmallVec<[Value; 4]>,
    pub kwargs: SmallVec<[(StringId, Value); 2]>,
}

impl ArgValues {
    pub fn positional(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: SmallVec::new(),
        }
    }

    /// Every value held by these arguments, used to keep them rooted across a call.
    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        self.args.iter().copied().chain(self.kwargs.iter().map(|(_, v)| *v))
    }

    /// Rejects keyword arguments for builtins that take none.
    pub fn check_no_kwargs(&self, name: &str, interns: &Interns) -> RunResult<()> {
        match self.kwargs.first() {
            Some((key, _)) => Err(SimpleException::new_msg(
                ExcType::TypeError,
                format!("{name}() got an unexpected keyword argument '{}'", interns.get_str(*key)),
            )
            .into()),
            None => Ok(()),
        }
    }

    /// Checks that exactly `expected` positional arguments were passed.
    pub fn check_exact(&self, name: &str, expected: usize) -> RunResult<()> {
        let given = self.args.len();
        if given == expected {
            Ok(())
        } else {
            let plural = if expected == 1 { "" } else { "s" };
            Err(SimpleException::new_msg(
                ExcType::TypeError,
                format!("{name}() takes exactly {expected} argument{plural} ({given} given)"),
            )
            .into())
        }
    }

    /// Checks that between `min` and `max` positional arguments were passed.
    pub fn check_range(&self, name: &str, min: usize, max: usize) -> RunResult<()> {
        let given = self.args.len();
        if given < min {
            let plural = if min == 1 { "" } else { "s" };
            Err(SimpleException::new_msg(
                ExcType::TypeError,
                format!("{name} expected at least {min} argument{plural}, got {given}"),
            )
            .into())
        } else if given > max {
            let plural = if max == 1 { "" } else { "s" };
            Err(SimpleException::new_msg(
                ExcType::TypeError,
                format!("{name} expected at most {max} argument{plural}, got {given}"),
            )
            .into())
        } else {
            Ok(())
        }
    }

    /// The single positional argument of a one-argument builtin.
    pub fn get_one_arg(&self, name: &str, interns: &Interns) -> RunResult<Value> {
        self.check_no_kwargs(name, interns)?;
        self.check_exact(name, 1)?;
        Ok(self.args[0])
    }
}
