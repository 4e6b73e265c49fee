//! Time-bounded excerpts of local video files.
//!
//! A subclip is re-encoded with a fixed video codec instead of stream-copied:
//! arbitrary start/end offsets rarely land on keyframes, and a stream copy
//! would snap the cut to the nearest keyframe.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument};

use crate::transcode::{PartialOutput, TranscodeError, Transcoder};

/// Video codec used for subclip re-encoding.
pub const SUBCLIP_VIDEO_CODEC: &str = "libx264";

/// Audio codec used for subclip re-encoding.
pub const SUBCLIP_AUDIO_CODEC: &str = "aac";

/// Errors produced by subclip extraction.
#[derive(Debug, Error)]
pub enum SubclipError {
    /// `end` does not exceed `start`.
    #[error("invalid subclip range: end ({end}s) must be greater than start ({start}s)")]
    InvalidRange {
        /// Requested start offset.
        start: u64,
        /// Requested end offset.
        end: u64,
    },

    /// `end` lies past the end of the source.
    #[error("subclip end {end}s is beyond the source duration of {duration_secs:.3}s")]
    RangeOutOfBounds {
        /// Requested end offset.
        end: u64,
        /// Probed source duration.
        duration_secs: f64,
    },

    /// The source file does not exist.
    #[error("subclip source not found: {path}")]
    SourceMissing {
        /// The missing source.
        path: PathBuf,
    },

    /// The source duration could not be probed.
    #[error("could not probe {path}: {source}")]
    Probe {
        /// The probed source.
        path: PathBuf,
        /// The engine error.
        #[source]
        source: TranscodeError,
    },

    /// The re-encode failed.
    #[error("subclip encoding failed: {0}")]
    Engine(#[from] TranscodeError),

    /// Preparing or moving the output failed.
    #[error("IO error placing subclip {path}: {source}")]
    Io {
        /// The output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// A validated subclip request with its derived output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubclipJob {
    /// Source file.
    pub source: PathBuf,
    /// Start offset in seconds.
    pub start: u64,
    /// End offset in seconds.
    pub end: u64,
    /// `<stem>-subclip-<start>-<end><ext>` beside the source.
    pub output: PathBuf,
}

impl SubclipJob {
    /// Validates the range and derives the output path. Touches no files.
    ///
    /// # Errors
    ///
    /// Returns [`SubclipError::InvalidRange`] when `end <= start`.
    pub fn new(source: &Path, start: u64, end: u64) -> Result<Self, SubclipError> {
        validate_range(start, end)?;
        Ok(Self {
            source: source.to_path_buf(),
            start,
            end,
            output: subclip_output_path(source, start, end),
        })
    }
}

/// Checks that `start..end` is a non-empty range, without looking at any file.
///
/// # Errors
///
/// Returns [`SubclipError::InvalidRange`] when `end <= start`.
pub fn validate_range(start: u64, end: u64) -> Result<(), SubclipError> {
    if end <= start {
        return Err(SubclipError::InvalidRange { start, end });
    }
    Ok(())
}

/// Derives the deterministic subclip name for `source`.
///
/// `media/movie.mp4`, 10, 25 → `media/movie-subclip-10-25.mp4`
#[must_use]
pub fn subclip_output_path(source: &Path, start: u64, end: u64) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    source.with_file_name(format!("{stem}-subclip-{start}-{end}{ext}"))
}

/// Cuts and re-encodes ranges of local files.
#[derive(Debug, Clone)]
pub struct Subclipper {
    transcoder: Transcoder,
}

impl Subclipper {
    /// Creates a subclipper that runs the given transcoder.
    #[must_use]
    pub fn new(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }

    /// Writes `[start, end)` of `source` to the derived subclip path.
    ///
    /// Calling again with the same arguments replaces the same output file.
    ///
    /// # Errors
    ///
    /// Returns [`SubclipError::InvalidRange`] before any file access when
    /// `end <= start`, [`SubclipError::RangeOutOfBounds`] when `end` exceeds
    /// the probed duration, and engine/IO errors otherwise. No output file is
    /// left behind on failure.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub async fn clip(&self, source: &Path, start: u64, end: u64) -> Result<PathBuf, SubclipError> {
        let job = SubclipJob::new(source, start, end)?;

        if !tokio::fs::try_exists(&job.source).await.unwrap_or(false) {
            return Err(SubclipError::SourceMissing {
                path: job.source.clone(),
            });
        }

        let duration = self
            .transcoder
            .probe_duration(&job.source)
            .await
            .map_err(|source| SubclipError::Probe {
                path: job.source.clone(),
                source,
            })?;
        if Duration::from_secs(job.end) > duration {
            return Err(SubclipError::RangeOutOfBounds {
                end: job.end,
                duration_secs: duration.as_secs_f64(),
            });
        }

        let partial = PartialOutput::for_target(&job.output).map_err(|source| SubclipError::Io {
            path: job.output.clone(),
            source,
        })?;
        self.transcoder
            .run_ffmpeg(encode_args(&job, partial.path()))
            .await?;
        let output = partial.commit().map_err(|source| SubclipError::Io {
            path: job.output.clone(),
            source,
        })?;

        info!(output = %output.display(), start, end, "subclip written");
        Ok(output)
    }
}

fn encode_args(job: &SubclipJob, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(job.source.clone().into());
    args.push("-ss".into());
    args.push(job.start.to_string().into());
    args.push("-to".into());
    args.push(job.end.to_string().into());
    for arg in ["-c:v", SUBCLIP_VIDEO_CODEC, "-c:a", SUBCLIP_AUDIO_CODEC] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}
