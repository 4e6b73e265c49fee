//! Vidstitch Core Library
//!
//! Fetches a remote video's separate audio and video streams, stitches them
//! into one container, records provenance metadata beside the result, and
//! cuts time-bounded subclips from local files.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`catalog`] - Source metadata and stream listing (`yt-dlp` backed)
//! - [`select`] - Best audio/video stream selection
//! - [`download`] - Streaming HTTP track downloads
//! - [`transcode`] - `ffmpeg`/`ffprobe` process runner
//! - [`stitch`] - Stream-copy muxing of audio and video
//! - [`staging`] - Per-run staging directories
//! - [`metadata`] - JSON provenance records
//! - [`subclip`] - Re-encoded subclips of local files
//! - [`pipeline`] - Acquisition orchestration
//! - [`config`] - Defaults and config-file loading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod download;
pub mod metadata;
pub mod pipeline;
pub mod select;
pub mod staging;
pub mod stitch;
pub mod subclip;
pub mod transcode;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError, SourceMeta, StreamDescriptor, StreamKind, YtDlpCatalog};
pub use config::{ConfigError, FileConfig, PipelineConfig};
pub use download::{DownloadError, DownloadedTrack, HttpClient};
pub use metadata::{MetadataError, OutputArtifact, RequestArgs};
pub use pipeline::{
    AcquisitionError, AcquisitionMode, AcquisitionOutcome, AcquisitionRequest, Pipeline,
};
pub use select::{SelectError, select_audio, select_video};
pub use staging::{StagingArea, StagingError};
pub use stitch::{StitchError, Stitcher};
pub use subclip::{SubclipError, SubclipJob, Subclipper, validate_range};
pub use transcode::{TranscodeError, Transcoder};
