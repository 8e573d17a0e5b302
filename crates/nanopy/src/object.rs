use std::fmt::{self, Write};

use ahash::AHashSet;

use crate::{
    heap::{Heap, HeapData, HeapId},
    intern::Interns,
    resource::ResourceTracker,
    types::str::string_repr,
    value::{Value, float_repr},
};

/// A Python value returned from the interpreter.
///
/// This is the public-facing type for Python values. It owns all its data and can be
/// freely cloned, serialized, or stored after the heap that produced it is gone.
///
/// Values with no structural mapping (functions, classes, instances, ranges) are
/// returned as `Repr` holding their Python `repr()`. A container that contains
/// itself is cut off with a `Repr` placeholder such as `[...]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Object {
    /// Python's `None` singleton.
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Object>),
    Tuple(Vec<Object>),
    /// Set members in insertion order.
    Set(Vec<Object>),
    /// Key/value pairs in insertion order.
    Dict(Vec<(Object, Object)>),
    /// The `repr()` of a value with no structural mapping.
    Repr(String),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::Repr(s) => f.write_str(s),
            _ => self.repr_fmt(f),
        }
    }
}

impl Object {
    /// Snapshots a runtime value, copying everything it references out of the heap.
    pub(crate) fn new(value: Value, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Self {
        let mut visiting = AHashSet::new();
        Self::from_value(value, heap, interns, &mut visiting)
    }

    /// `visiting` holds the containers on the current path, for cycle detection.
    fn from_value(
        value: Value,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        visiting: &mut AHashSet<HeapId>,
    ) -> Self {
        let id = match value {
            Value::None => return Self::None,
            Value::Bool(b) => return Self::Bool(b),
            Value::Int(i) => return Self::Int(i),
            Value::Float(f) => return Self::Float(f),
            Value::InternString(string_id) => return Self::String(interns.get_str(string_id).to_owned()),
            Value::Builtin(_) => return Self::Repr(value.py_repr(heap, interns)),
            Value::Ref(id) => id,
        };
        if visiting.contains(&id) {
            return Self::Repr(
                match heap.get(id) {
                    HeapData::List(_) => "[...]",
                    HeapData::Tuple(_) => "(...)",
                    _ => "{...}",
                }
                .to_owned(),
            );
        }
        visiting.insert(id);
        let mut convert = |item: &Value| Self::from_value(*item, heap, interns, visiting);
        let object = match heap.get(id) {
            HeapData::Str(s) => Self::String(s.as_str().to_owned()),
            HeapData::List(list) => Self::List(list.as_slice().iter().map(&mut convert).collect()),
            HeapData::Tuple(tuple) => Self::Tuple(tuple.as_slice().iter().map(&mut convert).collect()),
            HeapData::Set(set) => Self::Set(set.iter().map(&mut convert).collect()),
            HeapData::Dict(dict) => Self::Dict(
                dict.iter()
                    .map(|(key, value)| (convert(key), convert(value)))
                    .collect(),
            ),
            _ => Self::Repr(value.py_repr(heap, interns)),
        };
        visiting.remove(&id);
        object
    }

    /// Python `repr()` of this value.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut s = String::new();
        // writing to a String cannot fail
        let _ = self.repr_fmt(&mut s);
        s
    }

    fn repr_fmt(&self, f: &mut impl Write) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&float_repr(*v)),
            Self::String(s) => {
                let mut quoted = String::with_capacity(s.len() + 2);
                string_repr(&mut quoted, s);
                f.write_str(&quoted)
            }
            Self::List(items) => {
                f.write_char('[')?;
                repr_items(f, items)?;
                f.write_char(']')
            }
            Self::Tuple(items) => {
                f.write_char('(')?;
                repr_items(f, items)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::Set(items) if items.is_empty() => f.write_str("set()"),
            Self::Set(items) => {
                f.write_char('{')?;
                repr_items(f, items)?;
                f.write_char('}')
            }
            Self::Dict(pairs) => {
                f.write_char('{')?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.repr_fmt(f)?;
                    f.write_str(": ")?;
                    value.repr_fmt(f)?;
                }
                f.write_char('}')
            }
            Self::Repr(s) => f.write_str(s),
        }
    }

    /// Python truthiness of this value.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(items) | Self::Tuple(items) | Self::Set(items) => !items.is_empty(),
            Self::Dict(pairs) => !pairs.is_empty(),
            Self::Repr(_) => true,
        }
    }

    /// Returns the Python type name for this value (e.g., `"int"`, `"str"`, `"list"`).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Dict(_) => "dict",
            Self::Repr(_) => "repr",
        }
    }
}

fn repr_items(f: &mut impl Write, items: &[Object]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.repr_fmt(f)?;
    }
    Ok(())
}

/// Error returned when an [`Object`] is not of the requested Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
    pub expected: &'static str,
    pub actual: &'static str,
}

impl ConversionError {
    #[must_use]
    pub fn new(expected: &'static str, actual: &'static str) -> Self {
        Self { expected, actual }
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected {}, got {}", self.expected, self.actual)
    }
}

impl std::error::Error for ConversionError {}

impl TryFrom<&Object> for i64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Int(i) => Ok(*i),
            _ => Err(ConversionError::new("int", value.type_name())),
        }
    }
}

/// Ints convert too, matching Python's int-to-float promotion.
impl TryFrom<&Object> for f64 {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Float(f) => Ok(*f),
            Object::Int(i) => Ok(*i as Self),
            _ => Err(ConversionError::new("float", value.type_name())),
        }
    }
}

impl TryFrom<&Object> for String {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::String(s) => Ok(s.clone()),
            _ => Err(ConversionError::new("str", value.type_name())),
        }
    }
}

impl TryFrom<&Object> for bool {
    type Error = ConversionError;

    fn try_from(value: &Object) -> Result<Self, Self::Error> {
        match value {
            Object::Bool(b) => Ok(*b),
            _ => Err(ConversionError::new("bool", value.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prints_strings_bare_and_containers_as_repr() {
        let list = Object::List(vec![
            Object::String("a".to_owned()),
            Object::Float(2.0),
            Object::None,
        ]);
        assert_eq!(list.to_string(), "['a', 2.0, None]");
        assert_eq!(Object::String("a".to_owned()).to_string(), "a");
        assert_eq!(Object::Tuple(vec![Object::Int(1)]).to_string(), "(1,)");
        assert_eq!(Object::Set(vec![]).to_string(), "set()");
        let dict = Object::Dict(vec![(Object::String("k".to_owned()), Object::Bool(true))]);
        assert_eq!(dict.py_repr(), "{'k': True}");
    }

    #[test]
    fn conversions_check_the_variant() {
        assert_eq!(i64::try_from(&Object::Int(3)), Ok(3));
        assert_eq!(f64::try_from(&Object::Int(3)), Ok(3.0));
        let err = bool::try_from(&Object::Int(1)).unwrap_err();
        assert_eq!(err.to_string(), "expected bool, got int");
    }
}
