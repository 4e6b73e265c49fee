//! HTTP client wrapper for downloading streams.
//!
//! This module provides the `HttpClient` struct which handles streaming
//! downloads with proper timeout configuration and error handling.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{HeaderName, HeaderValue};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, default_user_agent};
use super::error::DownloadError;
use crate::catalog::StreamDescriptor;

/// HTTP client for downloading streams to disk.
///
/// This client is designed to be created once per run and shared by the
/// audio and video downloads, taking advantage of connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

/// A stream that has been fully written to disk.
#[derive(Debug, Clone)]
pub struct DownloadedTrack {
    /// Where the stream was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// When the request was issued.
    pub started_at: Instant,
    /// When the last byte was flushed.
    pub finished_at: Instant,
}

impl DownloadedTrack {
    /// Wall-clock time spent on the transfer.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.finished_at.saturating_duration_since(self.started_at)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes without receiving any bytes
    /// - No cap on the total transfer time
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// `read_timeout_secs` bounds each read from the connection, so a slow
    /// transfer that keeps delivering bytes is never cut off.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Downloads `stream` to `destination_dir/filename`.
    ///
    /// An existing file at the destination is truncated. When the transfer
    /// fails the partially written file is removed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The stream URL is invalid or not HTTP(S)
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - Writing to disk fails
    #[must_use = "download result contains the path of the written stream"]
    #[instrument(skip(self, stream, destination_dir), fields(stream_id = %stream.id, kind = %stream.kind))]
    pub async fn download(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
        filename: &str,
    ) -> Result<DownloadedTrack, DownloadError> {
        let url = stream.url.as_str();
        let parsed_url = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let file_path = destination_dir.join(filename);
        debug!(path = %file_path.display(), "starting download");

        let started_at = Instant::now();
        let response = self.send_request(stream).await?;

        let mut file = File::create(&file_path)
            .await
            .map_err(|e| DownloadError::io(file_path.clone(), e))?;

        // Stream response body to file, with cleanup on error
        let stream_result = stream_to_file(&mut file, response, url, &file_path).await;
        drop(file);
        if stream_result.is_err() {
            debug!(path = %file_path.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        let bytes = stream_result?;
        let finished_at = Instant::now();

        let track = DownloadedTrack {
            path: file_path,
            bytes,
            started_at,
            finished_at,
        };
        info!(
            path = %track.path.display(),
            bytes,
            elapsed_ms = u64::try_from(track.elapsed().as_millis()).unwrap_or(u64::MAX),
            "download complete"
        );
        Ok(track)
    }

    async fn send_request(
        &self,
        stream: &StreamDescriptor,
    ) -> Result<reqwest::Response, DownloadError> {
        let url = stream.url.as_str();
        let mut request = self.client.get(url);
        for (name, value) in &stream.headers {
            let invalid = || DownloadError::InvalidHeader {
                url: url.to_string(),
                name: name.clone(),
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            request = request.header(header_name, header_value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut body = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = body.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
