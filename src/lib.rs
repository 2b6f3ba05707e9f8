//! JOSS: binary serialization for rich structured values.
//!
//! Values are kept in a [`Heap`] arena and referred to by [`ObjectId`], so
//! shared and cyclic structure is expressed directly. Every object is written
//! once; later occurrences become back-references.
//!
//! # Architecture
//!
//! - **`wire`**: Tag grammar, size fields and the one-pass codecs
//! - **`stream`**: Chunked encoder and resumable decoder, plus async adapters
//! - **`types`**: The value model (`Value`, `Object`, `Heap`, `Document`)
//! - **`options`**: Endianness, chunk size and length limits
//!
//! # Entry points
//!
//! - [`serialize`] / [`deserialize`] work on complete buffers.
//! - [`serializable`] returns a [`StreamEncoder`] producing bounded chunks.
//! - [`deserializable`] returns a [`StreamDecoder`] accepting chunks of any size.
//! - [`deserializing`] drives a decoder from an asynchronous [`ByteSource`].

pub mod error;
pub mod options;
pub mod stream;
pub mod types;
pub mod wire;

use bytes::Bytes;

pub use error::JossError;
pub use options::{DeserializeOptions, Endian, SerializeOptions};
#[cfg(feature = "stream")]
pub use stream::StreamSource;
pub use stream::{
    ByteSource, EncodeStep, ReaderSource, StreamDecoder, StreamEncoder, deserializing,
    write_serialized,
};
pub use types::{Document, Heap, Object, ObjectId, Value};

/// Encodes `root` and everything reachable from it.
pub fn serialize(heap: &Heap, root: &Value, options: &SerializeOptions) -> Bytes {
    wire::encode_document(heap, root, options.get_endian())
}

/// Decodes a complete encoding.
///
/// Fails with [`JossError::Ended`] on truncated input and
/// [`JossError::Unused`] when bytes follow the value.
pub fn deserialize(bytes: &[u8]) -> Result<Document, JossError> {
    wire::decode_document(bytes)
}

/// Returns an encoder that yields the encoding of `root` in chunks.
pub fn serializable<'h>(
    heap: &'h Heap,
    root: &Value,
    options: &SerializeOptions,
) -> StreamEncoder<'h> {
    StreamEncoder::new(heap, root.clone(), options)
}

/// Returns a decoder session that accepts the encoding in chunks.
pub fn deserializable(options: &DeserializeOptions) -> StreamDecoder {
    StreamDecoder::new(options)
}
