//! Writes a streaming encoding to an async byte sink.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::encoder::StreamEncoder;
use crate::error::JossError;

/// Writes every chunk of `encoder` to `writer`, then flushes.
///
/// Returns the number of bytes written.
pub async fn write_serialized<W: AsyncWrite + Unpin>(
    writer: &mut W,
    encoder: StreamEncoder<'_>,
) -> Result<u64, JossError> {
    let mut written = 0u64;
    for chunk in encoder {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}
