//! Module `file_ops`
//!
//! Streaming loops that move bytes between an open data channel and a file
//! or a directory listing. The same loops serve both the server handlers and
//! the client driver. None of them retries: the first I/O error abandons the
//! transfer and whatever was already written stays written.

use log::{debug, info};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::TransportError;
use crate::transfer::TransferResult;

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Copies `source` into `sink` in `buffer_size` chunks until `source` hits
/// end-of-file, then flushes `sink`.
async fn stream_chunks<R, W>(
    source: &mut R,
    sink: &mut W,
    buffer_size: usize,
) -> Result<TransferResult, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let started = Instant::now();
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total_bytes = 0u64;

    loop {
        let n = source
            .read(&mut buffer)
            .await
            .map_err(|source| TransportError::Aborted {
                bytes: total_bytes,
                source,
            })?;
        if n == 0 {
            break;
        }

        sink.write_all(&buffer[..n])
            .await
            .map_err(|source| TransportError::Aborted {
                bytes: total_bytes,
                source,
            })?;
        total_bytes += n as u64;
    }

    sink.flush().await.map_err(|source| TransportError::Aborted {
        bytes: total_bytes,
        source,
    })?;

    Ok(TransferResult::completed(total_bytes, started.elapsed()))
}

/// Sends a file (or any reader) over the data channel, then shuts down the
/// write half so the peer sees end-of-file.
pub async fn send_file<R, W>(
    file: &mut R,
    data_stream: &mut W,
    buffer_size: usize,
) -> Result<TransferResult, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = stream_chunks(file, data_stream, buffer_size).await?;
    data_stream
        .shutdown()
        .await
        .map_err(|source| TransportError::Aborted {
            bytes: result.bytes,
            source,
        })?;

    info!(
        "Sent {} bytes in {} ms",
        result.bytes,
        result.duration_ms()
    );
    Ok(result)
}

/// Receives from the data channel until the peer closes it, writing every
/// chunk into `file`.
pub async fn receive_file<R, W>(
    data_stream: &mut R,
    file: &mut W,
    buffer_size: usize,
) -> Result<TransferResult, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let result = stream_chunks(data_stream, file, buffer_size).await?;
    info!(
        "Received {} bytes in {} ms",
        result.bytes,
        result.duration_ms()
    );
    Ok(result)
}

/// Writes pre-formatted listing lines to the data channel and closes it.
pub async fn send_listing<W>(
    data_stream: &mut W,
    lines: &[String],
) -> Result<TransferResult, TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let started = Instant::now();
    let mut total_bytes = 0u64;

    for line in lines {
        data_stream
            .write_all(line.as_bytes())
            .await
            .map_err(|source| TransportError::Aborted {
                bytes: total_bytes,
                source,
            })?;
        total_bytes += line.len() as u64;
    }

    data_stream
        .shutdown()
        .await
        .map_err(|source| TransportError::Aborted {
            bytes: total_bytes,
            source,
        })?;

    debug!("Listing of {} entries sent ({} bytes)", lines.len(), total_bytes);
    Ok(TransferResult::completed(total_bytes, started.elapsed()))
}
