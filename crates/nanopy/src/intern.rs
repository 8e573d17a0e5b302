//! Interning of identifiers and string literals.
//!
//! The parser hands every name and string literal to an [`InternerBuilder`], which
//! deduplicates them and returns a [`StringId`]. At run time the frozen [`Interns`]
//! table resolves ids back to text for printing, attribute lookup and error messages.
//!
//! StringIds are laid out as follows:
//! * 0 to 127 - single character strings for all 128 ASCII characters
//! * 1000 to 1000 + count(StaticStrings) - the [`StaticStrings`] variants
//! * 10_000+ - strings interned while parsing a program

use std::{str::FromStr, sync::LazyLock};

use ahash::AHashMap;
use strum::{EnumString, FromRepr, IntoStaticStr};

use crate::value::Value;

/// Index into the string interner's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the StringId for an ASCII byte.
    #[must_use]
    pub fn from_ascii(byte: u8) -> Self {
        Self(u32::from(byte))
    }
}

const STATIC_STRING_ID_OFFSET: u32 = 1000;
const INTERN_STRING_ID_OFFSET: usize = 10_000;

/// Leaked single-character strings so ASCII ids resolve to `&'static str`.
static ASCII_STRS: LazyLock<[&'static str; 128]> = LazyLock::new(|| {
    std::array::from_fn(|i| {
        let byte = u8::try_from(i).unwrap_or(b'?');
        &*Box::leak(char::from(byte).to_string().into_boxed_str())
    })
});

/// Names known at compile time: dunder names, keyword argument names and the
/// methods of the builtin container types.
#[repr(u16)]
#[derive(Debug, Clone, Copy, FromRepr, EnumString, IntoStaticStr, PartialEq, Eq, Hash)]
#[strum(serialize_all = "snake_case")]
pub enum StaticStrings {
    #[strum(serialize = "")]
    EmptyString,
    #[strum(serialize = "<module>")]
    Module,
    #[strum(serialize = "__init__")]
    DunderInit,
    #[strum(serialize = "__name__")]
    DunderName,
    #[strum(serialize = "__main__")]
    DunderMain,
    #[strum(serialize = "self")]
    SelfName,
    Sep,
    End,

    // list methods
    Append,
    Insert,
    Pop,
    Index,
    Count,

    // dict methods
    Get,
    Keys,
    Values,
    Items,

    // set methods
    Add,
    Remove,
    Discard,

    // str methods
    Upper,
    Lower,
    Strip,
    Split,
    Join,
    Replace,
    Startswith,
    Endswith,
    Find,

    // gc_stats() keys
    AllocatedBytes,
    NextGcBytes,
    LiveObjects,
    Collections,
}

impl StaticStrings {
    /// Converts a `StringId` back to a `StaticStrings` variant, if it is one.
    pub fn from_string_id(id: StringId) -> Option<Self> {
        let enum_id = id.0.checked_sub(STATIC_STRING_ID_OFFSET)?;
        u16::try_from(enum_id).ok().and_then(Self::from_repr)
    }
}

impl From<StaticStrings> for StringId {
    fn from(value: StaticStrings) -> Self {
        Self(value as u32 + STATIC_STRING_ID_OFFSET)
    }
}

impl From<StaticStrings> for Value {
    fn from(value: StaticStrings) -> Self {
        Self::InternString(value.into())
    }
}

impl PartialEq<StaticStrings> for StringId {
    fn eq(&self, other: &StaticStrings) -> bool {
        *self == Self::from(*other)
    }
}

/// Unique identifier for a `def` statement in the function definitions table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FunctionId(u32);

impl FunctionId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).unwrap_or(u32::MAX))
    }

    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deduplicating string interner used while parsing.
///
/// Interning the same string twice returns the same `StringId`. REPL sessions keep
/// one builder alive across snippets so ids stay stable between lines.
#[derive(Debug, Default, Clone)]
pub struct InternerBuilder {
    string_map: AHashMap<String, StringId>,
    strings: Vec<String>,
}

impl InternerBuilder {
    /// Creates an interner sized by a rough guess from the number of quotes in `code`.
    pub fn new(code: &str) -> Self {
        let capacity = code.bytes().filter(|&b| b == b'"' || b == b'\'').count() >> 1;
        Self {
            string_map: AHashMap::with_capacity(capacity),
            strings: Vec::with_capacity(capacity),
        }
    }

    /// Interns a string, returning its `StringId`.
    ///
    /// ASCII characters and [`StaticStrings`] resolve to their fixed ids; anything
    /// else is stored once and reused.
    pub fn intern(&mut self, s: &str) -> StringId {
        if s.len() == 1 {
            StringId::from_ascii(s.as_bytes()[0])
        } else if let Ok(ss) = StaticStrings::from_str(s) {
            ss.into()
        } else if let Some(id) = self.string_map.get(s) {
            *id
        } else {
            let raw = self.strings.len() + INTERN_STRING_ID_OFFSET;
            let id = StringId(u32::try_from(raw).unwrap_or(u32::MAX));
            self.strings.push(s.to_owned());
            self.string_map.insert(s.to_owned(), id);
            id
        }
    }

    /// Looks up a string by its `StringId`.
    #[inline]
    pub fn get_str(&self, id: StringId) -> &str {
        get_str(&self.strings, id)
    }

    /// Returns the id of `s` if it has already been interned.
    #[must_use]
    pub fn try_get_str_id(&self, s: &str) -> Option<StringId> {
        if s.len() == 1 {
            return Some(StringId::from_ascii(s.as_bytes()[0]));
        }
        if let Ok(ss) = StaticStrings::from_str(s) {
            return Some(ss.into());
        }
        self.string_map.get(s).copied()
    }
}

/// # Panics
///
/// Panics if the `StringId` did not come from this interner.
fn get_str(strings: &[String], id: StringId) -> &str {
    if let Ok(c) = u8::try_from(id.0)
        && c < 128
    {
        ASCII_STRS[c as usize]
    } else if let Some(intern_index) = id.index().checked_sub(INTERN_STRING_ID_OFFSET) {
        &strings[intern_index]
    } else {
        let static_str = StaticStrings::from_string_id(id).expect("invalid static string id");
        static_str.into()
    }
}

/// Read-only interned strings used during evaluation.
#[derive(Debug, Clone)]
pub(crate) struct Interns {
    strings: Vec<String>,
}

impl Interns {
    pub fn new(interner: InternerBuilder) -> Self {
        Self {
            strings: interner.strings,
        }
    }

    /// Snapshots a builder that the caller keeps using, as REPL sessions do.
    pub fn from_builder(interner: &InternerBuilder) -> Self {
        Self {
            strings: interner.strings.clone(),
        }
    }

    #[inline]
    pub fn get_str(&self, id: StringId) -> &str {
        get_str(&self.strings, id)
    }

    /// Tries to find the `StringId` for a given string, returning `None` if not interned.
    #[must_use]
    pub fn try_get_str_id(&self, s: &str) -> Option<StringId> {
        if s.len() == 1 {
            return Some(StringId::from_ascii(s.as_bytes()[0]));
        }
        if let Ok(ss) = StaticStrings::from_str(s) {
            return Some(ss.into());
        }
        self.strings.iter().position(|existing| existing == s).map(|index| {
            let raw = index + INTERN_STRING_ID_OFFSET;
            StringId(u32::try_from(raw).unwrap_or(u32::MAX))
        })
    }
}
