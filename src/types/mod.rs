//! The value model: primitives, heap objects and the arena that owns them.

mod binary;
mod collections;
mod value;

pub use binary::{Buffer, RegExp, TypedArray, TypedArrayKind};
pub use collections::{Array, Map, Record, Set};
pub use value::{BigInt, Document, Heap, Object, ObjectId, Value};
