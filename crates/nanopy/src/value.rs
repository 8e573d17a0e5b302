use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt::Write,
    hash::{DefaultHasher, Hash, Hasher},
};

use crate::{
    builtins::Builtins,
    heap::{Heap, HeapData, HeapId},
    intern::{Interns, StringId},
    resource::{MAX_DATA_RECURSION_DEPTH, ResourceTracker},
    types::{Type, str::string_repr},
};

/// A runtime value.
///
/// Scalars are stored inline and copied freely. Every composite value is a
/// [`HeapId`] handle into the [`Heap`], so copying a `Value` never copies the object
/// it refers to; two copies of a `Ref` are the same object.
///
/// String literals from the source are `InternString`s: they live in the interner,
/// which is permanently live, so they never need tracing.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    InternString(StringId),
    Builtin(Builtins),
    Ref(HeapId),
}

/// Numeric view of a value, with `bool` treated as `int`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

impl Value {
    /// The heap handle, for composite values.
    #[inline]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn py_type(self, heap: &Heap<impl ResourceTracker>) -> Type {
        match self {
            Self::None => Type::NoneType,
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Float(_) => Type::Float,
            Self::InternString(_) => Type::Str,
            Self::Builtin(builtin) => builtin.py_type(),
            Self::Ref(id) => heap.get(id).py_type(),
        }
    }

    /// Type name for error messages; instances report their class name.
    pub fn type_name<'a>(self, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Cow<'a, str> {
        if let Self::Ref(id) = self
            && let HeapData::Instance(instance) = heap.get(id)
            && let HeapData::Class(class) = heap.get(instance.class)
        {
            return Cow::Borrowed(interns.get_str(class.name));
        }
        Cow::Borrowed(self.py_type(heap).name())
    }

    /// Truthiness: `None`, `False`, zero, and empty strings and containers are falsy.
    pub fn py_bool(self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
            Self::Float(f) => f != 0.0,
            Self::InternString(id) => !interns.get_str(id).is_empty(),
            Self::Builtin(_) => true,
            Self::Ref(id) => match heap.get(id) {
                HeapData::Str(s) => !s.as_str().is_empty(),
                HeapData::List(list) => !list.is_empty(),
                HeapData::Tuple(tuple) => !tuple.is_empty(),
                HeapData::Set(set) => !set.is_empty(),
                HeapData::Dict(dict) => !dict.is_empty(),
                HeapData::Range(range) => range.len() > 0,
                _ => true,
            },
        }
    }

    pub fn as_number(self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(b))),
            Self::Int(i) => Some(Number::Int(i)),
            Self::Float(f) => Some(Number::Float(f)),
            _ => None,
        }
    }

    /// Integer view, accepting `bool`.
    pub fn as_int(self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(b)),
            Self::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Text of a `str` value, interned or heap-allocated.
    pub fn as_str<'a>(self, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Option<&'a str> {
        match self {
            Self::InternString(id) => Some(interns.get_str(id)),
            Self::Ref(id) => match heap.get(id) {
                HeapData::Str(s) => Some(s.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Identity comparison, as used by `is`.
    ///
    /// Scalars have no identity of their own, so they compare by value; `None`,
    /// `True` and `False` are singletons as in Python.
    pub fn is_identical(self, other: Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::InternString(a), Self::InternString(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }

    /// Python `==`.
    pub fn py_eq(self, other: Self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> bool {
        self.eq_depth(other, heap, interns, MAX_DATA_RECURSION_DEPTH)
    }

    fn eq_depth(self, other: Self, heap: &Heap<impl ResourceTracker>, interns: &Interns, depth: u16) -> bool {
        if self.is_identical(other) && !matches!(self, Self::Float(f) if f.is_nan()) {
            return true;
        }
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return number_eq(a, b);
        }
        if let (Some(a), Some(b)) = (self.as_str(heap, interns), other.as_str(heap, interns)) {
            return a == b;
        }
        let (Self::Ref(a), Self::Ref(b)) = (self, other) else {
            return false;
        };
        // past this depth the structures are treated as unequal rather than recursing further
        let Some(depth) = depth.checked_sub(1) else {
            return false;
        };
        match (heap.get(a), heap.get(b)) {
            (HeapData::List(x), HeapData::List(y)) => seq_eq(x.as_slice(), y.as_slice(), heap, interns, depth),
            (HeapData::Tuple(x), HeapData::Tuple(y)) => seq_eq(x.as_slice(), y.as_slice(), heap, interns, depth),
            (HeapData::Dict(x), HeapData::Dict(y)) => {
                x.len() == y.len()
                    && x.iter().all(|(key, value)| {
                        matches!(y.get(*key, heap, interns), Ok(Some(other)) if value.eq_depth(other, heap, interns, depth))
                    })
            }
            (HeapData::Set(x), HeapData::Set(y)) => {
                x.len() == y.len() && x.iter().all(|item| y.contains(*item, heap, interns).unwrap_or(false))
            }
            (HeapData::Range(x), HeapData::Range(y)) => x.normalized() == y.normalized(),
            (HeapData::BoundMethod(x), HeapData::BoundMethod(y)) => {
                x.function == y.function && x.instance.is_identical(y.instance)
            }
            _ => false,
        }
    }

    /// Python `hash()`, or `None` for unhashable values (lists, dicts, sets).
    ///
    /// Values that compare equal hash equally across types: `1`, `1.0` and `True`
    /// share a hash, as do interned and heap strings with the same text.
    pub fn py_hash(self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Option<u64> {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher, heap, interns, MAX_DATA_RECURSION_DEPTH)?;
        Some(hasher.finish())
    }

    fn hash_into(
        self,
        hasher: &mut DefaultHasher,
        heap: &Heap<impl ResourceTracker>,
        interns: &Interns,
        depth: u16,
    ) -> Option<()> {
        if let Some(number) = self.as_number() {
            match number {
                Number::Int(i) => hash_int(hasher, i),
                Number::Float(f) => match float_as_exact_int(f) {
                    Some(i) => hash_int(hasher, i),
                    None => {
                        1u8.hash(hasher);
                        f.to_bits().hash(hasher);
                    }
                },
            }
            return Some(());
        }
        if let Some(s) = self.as_str(heap, interns) {
            2u8.hash(hasher);
            s.hash(hasher);
            return Some(());
        }
        match self {
            Self::None => 3u8.hash(hasher),
            Self::Builtin(builtin) => {
                4u8.hash(hasher);
                builtin.hash(hasher);
            }
            Self::Ref(id) => match heap.get(id) {
                HeapData::Tuple(tuple) => {
                    let depth = depth.checked_sub(1)?;
                    5u8.hash(hasher);
                    tuple.len().hash(hasher);
                    for item in tuple.as_slice() {
                        item.hash_into(hasher, heap, interns, depth)?;
                    }
                }
                HeapData::Range(range) => {
                    6u8.hash(hasher);
                    range.normalized().hash(hasher);
                }
                HeapData::BoundMethod(method) => {
                    7u8.hash(hasher);
                    method.function.hash(hasher);
                    method.instance.ref_id().hash(hasher);
                }
                HeapData::Function(_) | HeapData::Class(_) | HeapData::Instance(_) => {
                    8u8.hash(hasher);
                    id.hash(hasher);
                }
                HeapData::Str(s) => {
                    2u8.hash(hasher);
                    s.as_str().hash(hasher);
                }
                HeapData::List(_) | HeapData::Dict(_) | HeapData::Set(_) | HeapData::Scope(_) => return None,
            },
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::InternString(_) => {}
        }
        Some(())
    }

    /// Ordering for `<`, `<=`, `>` and `>=`; `None` if the types are unorderable.
    pub fn py_cmp(self, other: Self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                _ => a.as_f64().partial_cmp(&b.as_f64()),
            };
        }
        if let (Some(a), Some(b)) = (self.as_str(heap, interns), other.as_str(heap, interns)) {
            return Some(a.cmp(b));
        }
        let (Self::Ref(a), Self::Ref(b)) = (self, other) else {
            return None;
        };
        let (x, y) = match (heap.get(a), heap.get(b)) {
            (HeapData::List(x), HeapData::List(y)) => (x.as_slice(), y.as_slice()),
            (HeapData::Tuple(x), HeapData::Tuple(y)) => (x.as_slice(), y.as_slice()),
            _ => return None,
        };
        // lexicographic: the first unequal pair decides, then length
        for (left, right) in x.iter().zip(y) {
            if !left.py_eq(*right, heap, interns) {
                return left.py_cmp(*right, heap, interns);
            }
        }
        Some(x.len().cmp(&y.len()))
    }

    /// Python `repr()`.
    pub fn py_repr(self, heap: &Heap<impl ResourceTracker>, interns: &Interns) -> String {
        let mut out = String::new();
        self.repr_fmt(&mut out, heap, interns, &mut Vec::new());
        out
    }

    /// Python `str()`: strings print unquoted, everything else as its repr.
    pub fn py_str<'a>(self, heap: &'a Heap<impl ResourceTracker>, interns: &'a Interns) -> Cow<'a, str> {
        match self.as_str(heap, interns) {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(self.py_repr(heap, interns)),
        }
    }

    /// Writes the repr into `out`.
    ///
    /// `seen` holds the containers currently being printed, so a container that
    /// contains itself prints as `[...]` instead of recursing forever.
    fn repr_fmt(self, out: &mut String, heap: &Heap<impl ResourceTracker>, interns: &Interns, seen: &mut Vec<HeapId>) {
        match self {
            Self::None => out.push_str("None"),
            Self::Bool(true) => out.push_str("True"),
            Self::Bool(false) => out.push_str("False"),
            Self::Int(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => out.push_str(&float_repr(f)),
            Self::InternString(id) => string_repr(out, interns.get_str(id)),
            Self::Builtin(builtin) => builtin.repr_fmt(out),
            Self::Ref(id) => {
                let data = heap.get(id);
                let is_container = matches!(data, HeapData::List(_) | HeapData::Tuple(_) | HeapData::Dict(_));
                if is_container && seen.contains(&id) {
                    out.push_str(match data {
                        HeapData::List(_) => "[...]",
                        HeapData::Tuple(_) => "(...)",
                        _ => "{...}",
                    });
                    return;
                }
                if is_container {
                    seen.push(id);
                }
                match data {
                    HeapData::Str(s) => string_repr(out, s.as_str()),
                    HeapData::List(list) => {
                        out.push('[');
                        repr_items(out, list.as_slice(), heap, interns, seen);
                        out.push(']');
                    }
                    HeapData::Tuple(tuple) => {
                        out.push('(');
                        repr_items(out, tuple.as_slice(), heap, interns, seen);
                        if tuple.len() == 1 {
                            out.push(',');
                        }
                        out.push(')');
                    }
                    HeapData::Set(set) => {
                        if set.is_empty() {
                            out.push_str("set()");
                        } else {
                            out.push('{');
                            for (i, item) in set.iter().enumerate() {
                                if i > 0 {
                                    out.push_str(", ");
                                }
                                item.repr_fmt(out, heap, interns, seen);
                            }
                            out.push('}');
                        }
                    }
                    HeapData::Dict(dict) => {
                        out.push('{');
                        for (i, (key, value)) in dict.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            key.repr_fmt(out, heap, interns, seen);
                            out.push_str(": ");
                            value.repr_fmt(out, heap, interns, seen);
                        }
                        out.push('}');
                    }
                    HeapData::Range(range) => range.repr_fmt(out),
                    HeapData::Function(function) => {
                        let _ = write!(out, "<function {} at {}>", interns.get_str(function.name), address(id));
                    }
                    HeapData::BoundMethod(method) => {
                        let name = match heap.get(method.function) {
                            HeapData::Function(function) => interns.get_str(function.name),
                            _ => "?",
                        };
                        let _ = write!(
                            out,
                            "<bound method {}.{name} of ",
                            method.instance.type_name(heap, interns)
                        );
                        method.instance.repr_fmt(out, heap, interns, seen);
                        out.push('>');
                    }
                    HeapData::Class(class) => {
                        let _ = write!(out, "<class '{}'>", interns.get_str(class.name));
                    }
                    HeapData::Instance(_) => {
                        let _ = write!(out, "<{} object at {}>", self.type_name(heap, interns), address(id));
                    }
                    HeapData::Scope(_) => out.push_str("<scope>"),
                }
                if is_container {
                    seen.pop();
                }
            }
        }
    }
}

fn repr_items(
    out: &mut String,
    items: &[Value],
    heap: &Heap<impl ResourceTracker>,
    interns: &Interns,
    seen: &mut Vec<HeapId>,
) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.repr_fmt(out, heap, interns, seen);
    }
}

fn seq_eq(x: &[Value], y: &[Value], heap: &Heap<impl ResourceTracker>, interns: &Interns, depth: u16) -> bool {
    x.len() == y.len() && x.iter().zip(y).all(|(a, b)| a.eq_depth(*b, heap, interns, depth))
}

fn number_eq(a: Number, b: Number) -> bool {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => a == b,
        (Number::Float(a), Number::Float(b)) => a == b,
        (Number::Int(i), Number::Float(f)) | (Number::Float(f), Number::Int(i)) => float_as_exact_int(f) == Some(i),
    }
}

/// The integer a float is exactly equal to, if there is one in `i64` range.
#[expect(clippy::cast_possible_truncation)]
fn float_as_exact_int(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && (-9.223_372_036_854_776e18..9.223_372_036_854_776e18).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

fn hash_int(hasher: &mut DefaultHasher, i: i64) {
    0u8.hash(hasher);
    i.hash(hasher);
}

/// Fake but stable address for reprs, derived from the handle.
fn address(id: HeapId) -> String {
    format!("0x{:012x}", 0x7f00_0000_0000 + id.index() * 0x40)
}

/// Returns a string representation of a float matching CPython's `repr()`.
///
/// `ryu` gives the shortest round-tripping digits; CPython additionally writes
/// exponents with a sign and at least two digits, and always shows a decimal point.
pub(crate) fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_owned();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-inf" } else { "inf" }.to_owned();
    }

    let mut buffer = ryu::Buffer::new();
    let s = buffer.format_finite(f);
    if let Some(e_pos) = s.find('e') {
        let (mantissa, exp) = s.split_at(e_pos);
        let exp = &exp[1..];
        let (sign, digits) = match exp.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exp),
        };
        format!("{mantissa}e{sign}{digits:0>2}")
    } else if s.contains('.') {
        s.to_owned()
    } else {
        format!("{s}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_matches_python() {
        assert_eq!(float_repr(2.0), "2.0");
        assert_eq!(float_repr(13.5), "13.5");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e20), "1e+20");
        assert_eq!(float_repr(1.5e-7), "1.5e-07");
        assert_eq!(float_repr(1e100), "1e+100");
        assert_eq!(float_repr(-0.5), "-0.5");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(number_eq(Number::Int(1), Number::Float(1.0)));
        assert!(!number_eq(Number::Int(1), Number::Float(1.5)));
        assert_eq!(float_as_exact_int(3.0), Some(3));
        assert_eq!(float_as_exact_int(f64::NAN), None);
    }
}
