//! HTTP downloader for selected streams.
//!
//! This module streams a [`StreamDescriptor`](crate::catalog::StreamDescriptor)'s
//! media URL into a staging directory, reporting the bytes written and the
//! wall-clock span of the transfer.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large tracks)
//! - Provider request headers forwarded from the descriptor
//! - Configurable timeouts (30s connect, 5min per read by default, no total cap)
//! - Partial files removed when a transfer fails
//!
//! # Example
//!
//! ```no_run
//! use vidstitch_core::catalog::StreamDescriptor;
//! use vidstitch_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let stream = StreamDescriptor::audio("140", "mp4", 128, "https://cdn.example/140");
//! let track = client.download(&stream, Path::new("./temp"), "audio.wav").await?;
//! println!("{} bytes in {:?}", track.bytes, track.elapsed());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;

pub use client::{DownloadedTrack, HttpClient};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
