//! Python builtin functions and type constructors.
//!
//! Each builtin function has its own submodule; `methods` holds the methods of
//! the builtin container types (`list.append`, `str.split`, ...).

mod abs;
mod convert;
mod exit;
mod gc;
mod input;
mod isinstance;
mod len;
mod methods;
mod min_max; // min and max share implementation
mod print;
mod sum;
mod r#type;

use std::fmt::Write;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    args::ArgValues,
    eval::Evaluator,
    exception_private::RunResult,
    io::PrintWriter,
    resource::ResourceTracker,
    tracer::EvalTracer,
    types::Type,
    value::Value,
};

/// Every builtin name a program can call without defining it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Builtins {
    /// A builtin function like `print` or `len`.
    Function(BuiltinsFunctions),
    /// A type constructor like `list` or `int`.
    Type(Type),
}

impl Builtins {
    /// Resolves a name that no scope binds.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(function) = name.parse::<BuiltinsFunctions>() {
            return Some(Self::Function(function));
        }
        let ty = match name {
            "str" => Type::Str,
            "int" => Type::Int,
            "float" => Type::Float,
            "bool" => Type::Bool,
            "list" => Type::List,
            "tuple" => Type::Tuple,
            "set" => Type::Set,
            "dict" => Type::Dict,
            "range" => Type::Range,
            _ => return None,
        };
        Some(Self::Type(ty))
    }

    /// Writes the Python repr() string for this callable.
    pub fn repr_fmt(self, out: &mut String) {
        let _ = match self {
            Self::Function(b) => write!(out, "<built-in function {b}>"),
            Self::Type(t) => write!(out, "<class '{t}'>"),
        };
    }

    pub fn py_type(self) -> Type {
        match self {
            Self::Function(_) => Type::BuiltinFunction,
            Self::Type(_) => Type::Type,
        }
    }
}

/// Builtin functions, named as Python spells them (`GcCollect` -> "gc_collect").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum BuiltinsFunctions {
    Abs,
    /// Also reachable as `time`.
    #[strum(to_string = "clock", serialize = "time")]
    Clock,
    Exit,
    GcCollect,
    GcStats,
    Input,
    Isinstance,
    Len,
    Max,
    Min,
    Print,
    Sum,
    Type,
}

impl<T: ResourceTracker, P: PrintWriter, Tr: EvalTracer> Evaluator<'_, T, P, Tr> {
    /// Calls a builtin function or type constructor.
    pub(crate) fn call_builtin(&mut self, builtin: Builtins, args: ArgValues) -> RunResult<Value> {
        let function = match builtin {
            Builtins::Function(function) => function,
            Builtins::Type(ty) => return convert::builtin_type_call(self, ty, args),
        };
        match function {
            BuiltinsFunctions::Abs => abs::builtin_abs(self.heap, args, self.interns),
            BuiltinsFunctions::Clock => gc::builtin_clock(self, args),
            BuiltinsFunctions::Exit => exit::builtin_exit(self.heap, args, self.interns),
            BuiltinsFunctions::GcCollect => gc::builtin_gc_collect(self, args),
            BuiltinsFunctions::GcStats => gc::builtin_gc_stats(self, args),
            BuiltinsFunctions::Input => input::builtin_input(self, args),
            BuiltinsFunctions::Isinstance => isinstance::builtin_isinstance(self.heap, args, self.interns),
            BuiltinsFunctions::Len => len::builtin_len(self.heap, args, self.interns),
            BuiltinsFunctions::Max => min_max::builtin_max(self, args),
            BuiltinsFunctions::Min => min_max::builtin_min(self, args),
            BuiltinsFunctions::Print => print::builtin_print(self, args),
            BuiltinsFunctions::Sum => sum::builtin_sum(self, args),
            BuiltinsFunctions::Type => r#type::builtin_type(self.heap, args, self.interns),
        }
    }
}
