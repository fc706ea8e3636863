//! Single-stream fallback.
//!
//! Streams the whole resource sequentially into one scratch file when
//! the server does not support byte ranges or the segmented pipeline
//! failed. Progress is reported with the same snapshot shape as
//! segmented mode but with an empty range list.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use segload_core::download::{DownloadError, DownloadResult};

use crate::progress::ProgressMsg;
use crate::streamer::WRITE_BUF_SIZE;

/// Stream the entire body into `scratch_file`.
///
/// Not resumable: each attempt restarts from byte zero, truncating any
/// prior partial file. The caller finalizes the scratch file into the
/// destination afterwards.
pub async fn stream_single(
    client: &Client,
    url: &str,
    scratch_file: &Path,
    cancel: &CancellationToken,
    updates: &mpsc::UnboundedSender<ProgressMsg>,
) -> DownloadResult<u64> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DownloadError::network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::invalid_response(response.status().as_u16()));
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(scratch_file)
        .await?;

    let mut stream = response.bytes_stream();
    let mut buf: Vec<u8> = Vec::with_capacity(WRITE_BUF_SIZE);
    let mut received = 0u64;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(DownloadError::Cancelled);
            }

            frame = stream.next() => match frame {
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    if buf.len() >= WRITE_BUF_SIZE {
                        file.write_all(&buf).await?;
                        received += buf.len() as u64;
                        buf.clear();
                        let _ = updates.send(ProgressMsg::Stream { received });
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
        file.write_all(&buf).await?;
        received += buf.len() as u64;
        let _ = updates.send(ProgressMsg::Stream { received });
    }
    file.flush().await?;

    tracing::debug!(bytes = received, "Single-stream transfer complete");
    Ok(received)
}
