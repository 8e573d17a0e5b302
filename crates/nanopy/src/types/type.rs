use std::fmt;

use strum::EnumString;

/// The Python type of a value.
///
/// User-defined classes all share [`Type::Instance`]; error messages that need the
/// class name go through `Value::type_name` instead.
#[derive(Debug, Clone, Copy, EnumString, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Set,
    Dict,
    Range,
    Function,
    #[strum(disabled)]
    BuiltinFunction,
    #[strum(disabled)]
    Method,
    /// A user-defined class object.
    Type,
    #[strum(disabled)]
    Instance,
}

impl Type {
    /// The name Python prints for this type, as in `'int' object is not iterable`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NoneType => "NoneType",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::List => "list",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Dict => "dict",
            Self::Range => "range",
            Self::Function => "function",
            Self::BuiltinFunction => "builtin_function_or_method",
            Self::Method => "method",
            Self::Type => "type",
            Self::Instance => "object",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn builtin_type_names_round_trip() {
        for name in ["int", "float", "str", "list", "tuple", "set", "dict", "range", "bool"] {
            let ty = Type::from_str(name).unwrap();
            assert_eq!(ty.to_string(), name);
        }
        assert!(Type::from_str("method").is_err());
    }
}
