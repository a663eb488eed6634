//! Streaming downloads into memory
//!
//! Bodies are streamed chunk by chunk into a buffer and only flushed to disk
//! once complete, so an interrupted transfer never leaves a partial file at
//! either cache tier. Cancellation races the body stream and wins between
//! chunks.

use futures::StreamExt;
use reqwest::Client;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::progress::{self, ProgressCallback, ProgressEvent};
use crate::sync::error::{Result, SyncError};

/// Stream a response body into memory
pub(crate) async fn fetch_to_buffer(
    client: &Client,
    url: &str,
    name: &str,
    expected_length: Option<u64>,
    cancel: &CancellationToken,
    progress: &Option<ProgressCallback>,
) -> Result<Vec<u8>> {
    debug!("Downloading {} from {}", name, url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| SyncError::HttpRequest {
            url: url.to_string(),
            source,
        })?;
    if !response.status().is_success() {
        return Err(SyncError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let total = expected_length.or(response.content_length());
    progress::emit(
        progress,
        ProgressEvent::DownloadStarted {
            name: name.to_string(),
            total_size: total,
        },
    );

    let mut buffer = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    let mut last_progress = Instant::now();

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(SyncError::Cancelled {
                    name: name.to_string(),
                });
            }
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(|source| SyncError::HttpRequest {
            url: url.to_string(),
            source,
        })?;
        buffer.extend_from_slice(&chunk);

        // Report progress at most every 100ms to avoid spam.
        if last_progress.elapsed().as_millis() >= 100 {
            progress::emit(
                progress,
                ProgressEvent::DownloadProgress {
                    name: name.to_string(),
                    downloaded: buffer.len() as u64,
                    total,
                },
            );
            last_progress = Instant::now();
        }
    }

    progress::emit(
        progress,
        ProgressEvent::DownloadComplete {
            name: name.to_string(),
            final_size: buffer.len() as u64,
        },
    );
    debug!("Downloaded {} ({} bytes)", name, buffer.len());
    Ok(buffer)
}
