//! Acquisition orchestration.
//!
//! A run looks up the source, refuses an existing output unless overwriting,
//! opens a fresh staging area, selects and downloads the tracks, stitches or
//! relocates them into the output directory, closes the staging area, and
//! finally writes the metadata record.
//!
//! The staging area is closed on every path out of [`Pipeline::run`]. If the
//! run future is dropped mid-flight the area's drop guard removes it instead.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{Catalog, CatalogError, SourceMeta};
use crate::config::PipelineConfig;
use crate::download::{DownloadError, HttpClient};
use crate::metadata::{self, MetadataError, OutputArtifact, RequestArgs};
use crate::select::{SelectError, select_audio, select_video};
use crate::staging::{StagingArea, StagingError};
use crate::stitch::{StitchError, Stitcher};
use crate::transcode::{PartialOutput, Transcoder};

/// Extension used for audio-only artifacts.
pub const AUDIO_EXTENSION: &str = "wav";

/// Title used when the source title is blank after cleaning.
const FALLBACK_TITLE: &str = "untitled";

/// Which tracks a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Best video and best audio, stitched.
    #[default]
    Full,
    /// Best audio only.
    AudioOnly,
    /// Best adaptive video only.
    VideoOnly,
}

impl fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::AudioOnly => write!(f, "audio-only"),
            Self::VideoOnly => write!(f, "video-only"),
        }
    }
}

/// One acquisition, as requested by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    /// Source URL.
    pub url: String,
    /// Tracks to produce.
    pub mode: AcquisitionMode,
    /// Replace an existing output and record.
    pub overwrite: bool,
    /// Requested subclip start in seconds.
    pub start: u64,
    /// Requested subclip end in seconds, 0 for none.
    pub end: u64,
}

impl AcquisitionRequest {
    /// Creates a full-mode request with no overwrite and no subclip range.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: AcquisitionMode::Full,
            overwrite: false,
            start: 0,
            end: 0,
        }
    }

    /// Sets the acquisition mode.
    #[must_use]
    pub fn with_mode(mut self, mode: AcquisitionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the overwrite flag.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the subclip range recorded with the artifact.
    #[must_use]
    pub fn with_range(mut self, start: u64, end: u64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// The request as recorded in the metadata `args` object.
    #[must_use]
    pub fn args(&self) -> RequestArgs {
        RequestArgs {
            url: self.url.clone(),
            start: self.start,
            end: self.end,
            audio_only: self.mode == AcquisitionMode::AudioOnly,
            video_only: self.mode == AcquisitionMode::VideoOnly,
            overwrite: self.overwrite,
        }
    }
}

/// Errors that abort an acquisition run.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The output exists and overwrite was not requested.
    #[error("output file exists. if you really want to download, run with the --overwrite option.")]
    OutputExists {
        /// The existing output.
        path: PathBuf,
    },

    /// The catalog could not describe the source.
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] CatalogError),

    /// No stream matched the selection rule.
    #[error(transparent)]
    NoStreamAvailable(#[from] SelectError),

    /// A track download failed.
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// Muxing the tracks failed.
    #[error(transparent)]
    Stitch(#[from] StitchError),

    /// The staging area could not be created or cleared.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// A single track could not be moved to the output path.
    #[error("failed to move {from} to {to}: {source}")]
    Relocate {
        /// Staged track.
        from: PathBuf,
        /// Output path.
        to: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be created.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The metadata record could not be written.
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct AcquisitionOutcome {
    /// The artifact and its provenance.
    pub artifact: OutputArtifact,
    /// Where the metadata record was written.
    pub metadata_path: PathBuf,
}

/// Runs acquisitions against a catalog.
pub struct Pipeline {
    catalog: Arc<dyn Catalog>,
    client: HttpClient,
    stitcher: Stitcher,
    config: PipelineConfig,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline using `catalog` and the binaries and timeouts in `config`.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, config: PipelineConfig) -> Self {
        let client = HttpClient::new_with_timeouts(config.connect_timeout_secs, config.read_timeout_secs);
        let stitcher = Stitcher::new(Transcoder::new(&config.ffmpeg, &config.ffprobe));
        Self {
            catalog,
            client,
            stitcher,
            config,
        }
    }

    /// Final artifact path for a source title in the given mode.
    #[must_use]
    pub fn output_path(&self, title: &str, mode: AcquisitionMode) -> PathBuf {
        let extension = match mode {
            AcquisitionMode::AudioOnly => AUDIO_EXTENSION,
            AcquisitionMode::Full | AcquisitionMode::VideoOnly => self.config.container.as_str(),
        };
        self.config
            .output_dir
            .join(format!("{}.{extension}", clean_title(title)))
    }

    /// Runs one acquisition to completion.
    ///
    /// Only the catalog metadata lookup happens before the overwrite check.
    /// An existing output, or an existing record at its `.json` sibling
    /// (shared by every mode), fails the run before any stream listing,
    /// staging, or download.
    ///
    /// # Errors
    ///
    /// Returns [`AcquisitionError`] naming the step that failed. When a step
    /// fails and the staging cleanup fails as well, the step's error is
    /// returned and the cleanup error is logged.
    #[instrument(skip(self, request), fields(url = %request.url, mode = %request.mode))]
    pub async fn run(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let meta = self.catalog.fetch_metadata(&request.url).await?;
        let output = self.output_path(&meta.title, request.mode);
        if !request.overwrite
            && let Some(path) = [output.clone(), metadata::derive_metadata_path(&output)]
                .into_iter()
                .find(|p| p.exists())
        {
            return Err(AcquisitionError::OutputExists { path });
        }

        fs::create_dir_all(&self.config.output_dir).map_err(|source| AcquisitionError::Io {
            path: self.config.output_dir.clone(),
            source,
        })?;

        let started = Instant::now();
        let staging = StagingArea::open(&self.config.staging_root)?;
        let acquired = self.acquire(request, &output, &staging).await;
        let cleanup = staging.close();
        match (acquired, cleanup) {
            (Ok(()), Ok(())) => {}
            (Ok(()), Err(cleanup_error)) => return Err(cleanup_error.into()),
            (Err(error), Ok(())) => return Err(error),
            (Err(error), Err(cleanup_error)) => {
                warn!(error = %cleanup_error, "staging cleanup failed after an earlier error");
                return Err(error);
            }
        }
        let download_elapsed = started.elapsed();

        let artifact = build_artifact(&output, request, &meta, download_elapsed);
        let metadata_path = metadata::record(&artifact, request.overwrite)?;
        info!(
            path = %artifact.path.display(),
            bytes = artifact.size_bytes,
            elapsed_ms = u64::try_from(download_elapsed.as_millis()).unwrap_or(u64::MAX),
            "acquisition complete"
        );
        Ok(AcquisitionOutcome {
            artifact,
            metadata_path,
        })
    }

    async fn acquire(
        &self,
        request: &AcquisitionRequest,
        output: &Path,
        staging: &StagingArea,
    ) -> Result<(), AcquisitionError> {
        let streams = self.catalog.list_streams(&request.url).await?;
        debug!(streams = streams.len(), "catalog listed streams");
        let container = self.config.container.as_str();
        let stem = output
            .file_stem()
            .map_or_else(|| FALLBACK_TITLE.into(), |s| s.to_string_lossy().into_owned());
        let audio_name = format!("{stem}.{AUDIO_EXTENSION}");
        let video_name = format!("{stem}.{container}");

        match request.mode {
            AcquisitionMode::AudioOnly => {
                let audio = select_audio(&streams, container)?;
                let track = self.client.download(audio, staging.path(), &audio_name).await?;
                relocate(&track.path, output)?;
            }
            AcquisitionMode::VideoOnly => {
                let video = select_video(&streams, container)?;
                let track = self.client.download(video, staging.path(), &video_name).await?;
                relocate(&track.path, output)?;
            }
            AcquisitionMode::Full => {
                let audio = select_audio(&streams, container)?;
                let video = select_video(&streams, container)?;
                info!(audio = %audio.id, video = %video.id, "selected streams");
                let dir = staging.path().to_path_buf();
                let (audio_track, video_track) = tokio::try_join!(
                    self.client.download(audio, &dir, &audio_name),
                    self.client.download(video, &dir, &video_name),
                )?;
                self.stitcher
                    .stitch(&video_track.path, &audio_track.path, output, request.overwrite)
                    .await?;
            }
        }
        Ok(())
    }
}

fn build_artifact(
    output: &Path,
    request: &AcquisitionRequest,
    meta: &SourceMeta,
    download_elapsed: std::time::Duration,
) -> OutputArtifact {
    OutputArtifact {
        path: output.to_path_buf(),
        size_bytes: fs::metadata(output).map_or(0, |m| m.len()),
        source_url: request.url.clone(),
        channel_url: meta.channel_url.clone(),
        duration: meta.duration,
        download_elapsed,
        created_at: Local::now(),
        args: request.args(),
    }
}

/// Makes a source title safe to use as a file name.
///
/// Path separators become `-`; a blank title becomes `untitled`.
#[must_use]
pub fn clean_title(title: &str) -> String {
    let cleaned = title.replace(['/', '\\'], "-");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Moves a staged track to `to`: rename, or copy through a partial file when
/// the two paths are on different filesystems.
fn relocate(from: &Path, to: &Path) -> Result<(), AcquisitionError> {
    let relocate_err = |source| AcquisitionError::Relocate {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(err) => debug!(error = %err, "rename failed, copying instead"),
    }

    let partial = PartialOutput::for_target(to).map_err(relocate_err)?;
    fs::copy(from, partial.path()).map_err(relocate_err)?;
    partial.commit().map_err(relocate_err)?;
    if let Err(err) = fs::remove_file(from) {
        debug!(path = %from.display(), error = %err, "staged copy left for staging cleanup");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_replaces_separators() {
        assert_eq!(clean_title("AC/DC \\ Live"), "AC-DC - Live");
        assert_eq!(clean_title("  "), "untitled");
        assert_eq!(clean_title("Plain"), "Plain");
    }

    #[test]
    fn test_request_args_reflect_mode() {
        let request = AcquisitionRequest::new("https://youtu.be/x")
            .with_mode(AcquisitionMode::AudioOnly)
            .with_overwrite(true)
            .with_range(5, 10);
        let args = request.args();
        assert!(args.audio_only);
        assert!(!args.video_only);
        assert!(args.overwrite);
        assert_eq!((args.start, args.end), (5, 10));
        assert_eq!(AcquisitionRequest::new("u").mode, AcquisitionMode::Full);
    }

    #[test]
    fn test_output_exists_message_is_single_line() {
        let err = AcquisitionError::OutputExists {
            path: PathBuf::from("downloads/x.mp4"),
        };
        assert_eq!(
            err.to_string(),
            "output file exists. if you really want to download, run with the --overwrite option."
        );
    }

    #[test]
    fn test_relocate_moves_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("staged.wav");
        let to = dir.path().join("out.wav");
        fs::write(&from, b"audio").unwrap();
        fs::write(&to, b"old").unwrap();

        relocate(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"audio");
    }

    #[test]
    fn test_relocate_missing_source_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = relocate(&dir.path().join("absent"), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, AcquisitionError::Relocate { .. }));
        assert!(!dir.path().join("out").exists());
    }
}
