//! Incremental encoding and decoding in bounded chunks.

pub mod decoder;
pub mod encoder;
pub mod sink;
pub mod source;

pub use decoder::StreamDecoder;
pub use encoder::{EncodeStep, StreamEncoder};
pub use sink::write_serialized;
#[cfg(feature = "stream")]
pub use source::StreamSource;
pub use source::{ByteSource, ReaderSource, deserializing};
