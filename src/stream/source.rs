//! Asynchronous byte sources feeding a [`StreamDecoder`].

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::decoder::StreamDecoder;
use crate::error::JossError;
use crate::options::DeserializeOptions;
use crate::types::Document;

/// Largest chunk read from an `AsyncRead` at once.
const READ_CHUNK_SIZE: usize = 16384;

/// A sequence of byte chunks arriving asynchronously.
#[async_trait]
pub trait ByteSource: Send {
    /// Returns the next chunk, or `None` once the source is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, JossError>;
}

/// Reads chunks of up to 16 KiB from an `AsyncRead`.
pub struct ReaderSource<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> ByteSource for ReaderSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, JossError> {
        self.buf.resize(READ_CHUNK_SIZE, 0);
        let n = self.reader.read(&mut self.buf[..]).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
    }
}

/// Pulls chunks from a `Stream` of byte buffers.
#[cfg(feature = "stream")]
pub struct StreamSource<S> {
    stream: S,
}

#[cfg(feature = "stream")]
impl<S> StreamSource<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[cfg(feature = "stream")]
#[async_trait]
impl<S, B> ByteSource for StreamSource<S>
where
    S: futures_util::Stream<Item = std::io::Result<B>> + Unpin + Send,
    B: Into<Bytes> + Send,
{
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, JossError> {
        use futures_util::StreamExt;

        match self.stream.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk.into())),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

/// Decodes everything `source` yields, closing the decoder at end of input.
pub async fn deserializing<S: ByteSource>(
    mut source: S,
    options: &DeserializeOptions,
) -> Result<Document, JossError> {
    let mut decoder = StreamDecoder::new(options);
    while let Some(chunk) = source.next_chunk().await? {
        decoder.write(&chunk)?;
    }
    tracing::debug!(bytes = decoder.received(), "byte source exhausted");
    decoder.close()
}
