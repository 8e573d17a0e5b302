use smallvec::SmallVec;

use crate::{
    args::ArgValues,
    exception_private::{ExcType, RunResult},
    expressions::{ExprLoc, Identifier, StmtLoc},
    heap::HeapId,
    intern::{FunctionId, Interns, StringId},
    value::Value,
};

/// A positional parameter and its default expression.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: StringId,
    /// Evaluated once, when the `def` statement runs.
    pub default: Option<ExprLoc>,
}

/// A parsed `def`, stored once in the function table and shared by every
/// function object created from it.
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Identifier,
    pub params: Vec<Param>,
    pub body: Vec<StmtLoc>,
}

impl FunctionDef {
    /// Number of parameters without a default; defaults always trail.
    pub fn required_count(&self) -> usize {
        self.params.iter().take_while(|p| p.default.is_none()).count()
    }

    /// Matches call arguments to parameters, filling in defaults.
    ///
    /// Returns one value per parameter, in declaration order. Errors use CPython's
    /// wording, e.g. `f() missing 1 required positional argument: 'b'`.
    pub(crate) fn bind_args(
        &self,
        defaults: &[Value],
        args: ArgValues,
        interns: &Interns,
    ) -> RunResult<SmallVec<[Value; 8]>> {
        let name = interns.get_str(self.name.name_id);
        let param_count = self.params.len();
        let required = param_count - defaults.len();
        let given = args.args.len();
        if given > param_count {
            return Err(ExcType::type_error_too_many_positional(name, required, param_count, given));
        }

        let mut bound: SmallVec<[Option<Value>; 8]> = args.args.into_iter().map(Some).collect();
        bound.resize(param_count, None);
        for (key, value) in args.kwargs {
            let Some(position) = self.params.iter().position(|p| p.name == key) else {
                return Err(ExcType::type_error_unexpected_keyword(name, interns.get_str(key)));
            };
            if bound[position].is_some() {
                return Err(ExcType::type_error_multiple_values(name, interns.get_str(key)));
            }
            bound[position] = Some(value);
        }

        let mut missing = Vec::new();
        for (i, slot) in bound.iter_mut().enumerate() {
            if slot.is_none() {
                match i.checked_sub(required) {
                    Some(default_index) => *slot = Some(defaults[default_index]),
                    None => missing.push(interns.get_str(self.params[i].name)),
                }
            }
        }
        if !missing.is_empty() {
            return Err(ExcType::type_error_missing_positional(name, &missing));
        }
        Ok(bound.into_iter().map(|v| v.unwrap_or(Value::None)).collect())
    }
}

/// A function object: created each time a `def` statement runs.
///
/// Holds the scope that was active at definition time. That scope stays alive
/// for as long as the function is reachable, which is what gives closures access
/// to enclosing locals after the enclosing call has returned.
#[derive(Debug)]
pub(crate) struct Function {
    pub func_id: FunctionId,
    pub name: StringId,
    /// Captured defining scope; every call's scope is a child of it.
    pub scope: HeapId,
    /// Values of the trailing parameters' defaults.
    pub defaults: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        exception_private::RunError,
        expressions::{Expr, Literal},
        intern::InternerBuilder,
        parse::CodeRange,
    };

    fn def(interner: &mut InternerBuilder, params: &[(&str, bool)]) -> FunctionDef {
        let position = CodeRange::default();
        FunctionDef {
            name: Identifier::new(interner.intern("area"), position),
            params: params
                .iter()
                .map(|(name, has_default)| Param {
                    name: interner.intern(name),
                    default: has_default.then(|| ExprLoc::new(position, Expr::Literal(Literal::None))),
                })
                .collect(),
            body: Vec::new(),
        }
    }

    fn message(err: RunError, interns: &Interns) -> String {
        err.into_python_exception(interns, "").summary()
    }

    #[test]
    fn defaults_fill_trailing_parameters() {
        let mut interner = InternerBuilder::new("");
        let def = def(&mut interner, &[("width", false), ("height", true)]);
        let interns = Interns::new(interner);
        let bound = def
            .bind_args(&[Value::Int(7)], ArgValues::positional([Value::Int(3)]), &interns)
            .unwrap();
        let ints: Vec<_> = bound.iter().filter_map(|v| v.as_int()).collect();
        assert_eq!(ints, vec![3, 7]);
        assert_eq!(def.required_count(), 1);
    }

    #[test]
    fn arity_errors_match_cpython() {
        let mut interner = InternerBuilder::new("");
        let def = def(&mut interner, &[("width", false), ("height", false)]);
        let interns = Interns::new(interner);

        let err = def
            .bind_args(&[], ArgValues::positional([Value::Int(1)]), &interns)
            .unwrap_err();
        assert_eq!(
            message(err, &interns),
            "TypeError: area() missing 1 required positional argument: 'height'"
        );

        let err = def
            .bind_args(&[], ArgValues::positional([Value::Int(1), Value::Int(2), Value::Int(3)]), &interns)
            .unwrap_err();
        assert_eq!(
            message(err, &interns),
            "TypeError: area() takes 2 positional arguments but 3 were given"
        );
    }
}
