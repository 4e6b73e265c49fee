//! Video catalog boundary.
//!
//! A catalog turns a source URL into two things the pipeline needs: the
//! source-level metadata (title, channel, nominal duration) and the list of
//! independently downloadable tracks. The pipeline only talks to the catalog
//! through the [`Catalog`] trait, so tests can substitute an in-memory fake.
//!
//! - [`Catalog`] - Async trait implemented by catalog backends
//! - [`StreamDescriptor`] - One downloadable audio or video track
//! - [`SourceMeta`] - Title, channel reference and duration of a source
//! - [`YtDlpCatalog`] - Backend that shells out to `yt-dlp --dump-single-json`

mod error;
mod ytdlp;

pub use error::CatalogError;
pub use ytdlp::YtDlpCatalog;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Audio-only track.
    Audio,
    /// Video track (adaptive streams carry no audio).
    Video,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// A catalog entry describing one downloadable track.
///
/// `rank` is the ordering key used by stream selection: the bitrate in kbps
/// for audio streams, the vertical resolution in pixels for video streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Catalog-assigned identifier.
    pub id: String,
    /// Audio or video.
    pub kind: StreamKind,
    /// Container format, normalized (`mp4`, `webm`, ...).
    pub container: String,
    /// Bitrate (audio) or resolution (video) rank key.
    pub rank: u32,
    /// Whether this is an adaptive (single-track) stream.
    pub adaptive: bool,
    /// Direct media URL.
    pub url: String,
    /// Extra request headers the provider requires for `url`.
    pub headers: Vec<(String, String)>,
}

impl StreamDescriptor {
    /// Creates an adaptive audio stream descriptor.
    #[must_use]
    pub fn audio(
        id: impl Into<String>,
        container: impl Into<String>,
        bitrate_kbps: u32,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: StreamKind::Audio,
            container: container.into(),
            rank: bitrate_kbps,
            adaptive: true,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Creates a video stream descriptor.
    #[must_use]
    pub fn video(
        id: impl Into<String>,
        container: impl Into<String>,
        height: u32,
        adaptive: bool,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: StreamKind::Video,
            container: container.into(),
            rank: height,
            adaptive,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Adds a request header required to fetch this stream.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Source-level metadata reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMeta {
    /// Human-readable title, used to name output files.
    pub title: String,
    /// Channel or uploader page, when known.
    pub channel_url: Option<String>,
    /// Nominal duration of the source.
    pub duration: Duration,
}

/// Narrow interface to a remote video catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Looks up title, channel and duration for `url`.
    async fn fetch_metadata(&self, url: &str) -> Result<SourceMeta, CatalogError>;

    /// Lists every downloadable stream for `url`, in catalog order.
    async fn list_streams(&self, url: &str) -> Result<Vec<StreamDescriptor>, CatalogError>;
}
