//! Heap-allocated runtime types and the [`Type`] tag shared by all values.
//!
//! Each module holds one `HeapData` payload and the pure operations on it.
//! Anything that allocates goes through the evaluator, which owns the tracer.
pub mod class;
pub mod dict;
pub mod list;
pub mod range;
pub mod set;
pub mod str;
pub mod tuple;
pub mod r#type;

pub(crate) use class::{BoundMethod, ClassObject, Instance};
pub(crate) use dict::Dict;
pub(crate) use list::List;
pub(crate) use range::Range;
pub(crate) use set::Set;
pub(crate) use str::Str;
pub(crate) use tuple::Tuple;
pub use r#type::Type;
