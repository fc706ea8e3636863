//! Per-range streaming.
//!
//! One streamer owns one chunk for the duration of an attempt: it
//! requests `bytes=(lower+received)-upper`, appends to the chunk's
//! scratch file, and reports the updated `ChunkState` to the aggregator
//! after every buffer flush. Cancellation is observed on every incoming
//! body frame, not only at block boundaries.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RANGE;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use segload_core::download::{ChunkState, DownloadError, DownloadResult};

use crate::progress::ProgressMsg;

/// Write buffer size: bytes are flushed to the scratch file in blocks
/// of this size rather than per-frame.
pub(crate) const WRITE_BUF_SIZE: usize = 32 * 1024;

/// Stream one chunk's missing bytes into its scratch file.
///
/// Resumable: streaming starts at `lower + received`, and the scratch
/// file is opened in append mode since it already holds `received`
/// bytes from a prior attempt. Returns the updated `ChunkState` once
/// the chunk's byte count is satisfied.
pub async fn stream_chunk(
    client: &Client,
    url: &str,
    mut chunk: ChunkState,
    scratch_dir: &Path,
    cancel: &CancellationToken,
    updates: &mpsc::UnboundedSender<ProgressMsg>,
) -> DownloadResult<ChunkState> {
    let path = scratch_dir.join(&chunk.file_name);

    // The scratch file is authoritative for bytes already on disk: a
    // carried-over state may lag behind the last flush of a prior
    // attempt. An overlong file (should not happen) is cut back, and a
    // missing file means nothing was kept, whatever the carried state
    // claims.
    if let Ok(meta) = tokio::fs::metadata(&path).await {
        if meta.len() > chunk.expected_len() {
            let file = OpenOptions::new().write(true).open(&path).await?;
            file.set_len(chunk.expected_len()).await?;
        }
        chunk.received = meta.len().min(chunk.expected_len());
    } else {
        chunk.received = 0;
    }

    if chunk.is_complete() {
        tracing::debug!(index = chunk.index, "Chunk already complete, skipping");
        return Ok(chunk);
    }

    let range_start = chunk.lower + chunk.received;
    let response = client
        .get(url)
        .header(RANGE, format!("bytes={range_start}-{}", chunk.upper))
        .send()
        .await
        .map_err(|e| DownloadError::network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::invalid_response(response.status().as_u16()));
    }

    tracing::debug!(
        index = chunk.index,
        range_start,
        range_end = chunk.upper,
        resumed_from = chunk.received,
        "Streaming chunk"
    );

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;

    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::with_capacity(WRITE_BUF_SIZE);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                // Unflushed buffer is discarded; the file still matches
                // `received` from the last flush.
                return Err(DownloadError::Cancelled);
            }

            frame = stream.next() => match frame {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    if buf.len() >= WRITE_BUF_SIZE {
                        flush(&mut file, &mut buf, &mut chunk, updates).await?;
                    }
                }
                Some(Err(e)) => {
                    return Err(DownloadError::network(e.to_string()));
                }
                None => break,
            }
        }
    }

    if !buf.is_empty() {
        flush(&mut file, &mut buf, &mut chunk, updates).await?;
    }
    file.flush().await?;

    if !chunk.is_complete() {
        return Err(DownloadError::network(format!(
            "truncated range body: got {} of {} bytes",
            chunk.received,
            chunk.expected_len()
        )));
    }

    tracing::debug!(index = chunk.index, bytes = chunk.received, "Chunk complete");
    Ok(chunk)
}

/// Drain the write buffer into the scratch file and publish the
/// updated chunk state.
async fn flush(
    file: &mut tokio::fs::File,
    buf: &mut Vec<u8>,
    chunk: &mut ChunkState,
    updates: &mpsc::UnboundedSender<ProgressMsg>,
) -> DownloadResult<()> {
    file.write_all(buf).await?;
    chunk.received += buf.len() as u64;
    buf.clear();

    if chunk.received > chunk.expected_len() {
        return Err(DownloadError::network(format!(
            "server sent more than the requested range: {} of {} bytes",
            chunk.received,
            chunk.expected_len()
        )));
    }

    // The aggregator outliving this streamer is not guaranteed during
    // teardown; a closed channel only means nobody is listening anymore.
    let _ = updates.send(ProgressMsg::Chunk(chunk.clone()));
    Ok(())
}
