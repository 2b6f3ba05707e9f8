//! The JOSS wire format.
//!
//! Every value starts with a tag byte whose top 3 bits select a category.
//! Sizes are minimal-width little-endian integers whose width lives in the
//! tag. Object-like values are written once; later occurrences become
//! back-references to the stream offset of their first tag.

pub mod decode;
pub mod encode;
pub mod marker;
pub mod refs;
pub mod swap;
pub mod varint;

pub use decode::decode_document;
pub use encode::{ArrayLayout, analyze_array, encode_document};
