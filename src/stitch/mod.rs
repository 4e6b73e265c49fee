//! Muxing of a downloaded video track and audio track into one container.
//!
//! The stitcher uses stream copy (no re-encode). The engine writes to a
//! partial sibling of the output which is renamed into place only after a
//! successful exit, so the canonical path never holds a half-written file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use crate::transcode::{PartialOutput, TranscodeError, Transcoder};

/// Errors produced while stitching.
#[derive(Debug, Error)]
pub enum StitchError {
    /// The output exists and overwriting was not requested.
    #[error("output file exists: {path}")]
    OutputExists {
        /// The existing output.
        path: PathBuf,
    },

    /// The transcoding engine failed.
    #[error("stitching failed: {0}")]
    Engine(#[from] TranscodeError),

    /// The engine exited successfully but produced nothing.
    #[error("stitching produced an empty file for {path}")]
    EmptyOutput {
        /// The intended output.
        path: PathBuf,
    },

    /// Preparing or moving the output failed.
    #[error("IO error placing stitched output {path}: {source}")]
    Io {
        /// The output path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Muxes audio and video tracks with `ffmpeg -c copy`.
#[derive(Debug, Clone)]
pub struct Stitcher {
    transcoder: Transcoder,
}

impl Stitcher {
    /// Creates a stitcher that runs the given transcoder.
    #[must_use]
    pub fn new(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }

    /// Muxes `video` and `audio` into `output`.
    ///
    /// With `overwrite == false` an existing `output` is left untouched and
    /// [`StitchError::OutputExists`] is returned; with `overwrite == true` it
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`StitchError`] when the output exists (without overwrite), the
    /// engine fails or produces an empty file, or the result cannot be moved
    /// into place. No file is left at `output` on failure.
    #[instrument(skip(self), fields(output = %output.display()))]
    pub async fn stitch(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        overwrite: bool,
    ) -> Result<(), StitchError> {
        if !overwrite && output.exists() {
            return Err(StitchError::OutputExists {
                path: output.to_path_buf(),
            });
        }

        let partial = PartialOutput::for_target(output).map_err(|source| StitchError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        self.transcoder
            .run_ffmpeg(mux_args(video, audio, partial.path(), overwrite))
            .await?;

        if partial.written_len() == 0 {
            return Err(StitchError::EmptyOutput {
                path: output.to_path_buf(),
            });
        }

        partial.commit().map_err(|source| StitchError::Io {
            path: output.to_path_buf(),
            source,
        })?;
        info!("stitched audio and video");
        Ok(())
    }
}

fn mux_args(video: &Path, audio: &Path, output: &Path, overwrite: bool) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-nostdin", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(if overwrite { "-y" } else { "-n" }.into());
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    for arg in ["-map", "0:v:0", "-map", "1:a:0", "-c", "copy"] {
        args.push(arg.into());
    }
    args.push(output.into());
    args
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_args_use_stream_copy_and_pass_overwrite_flag() {
        let args = mux_args(
            Path::new("v.mp4"),
            Path::new("a.wav"),
            Path::new("out.part.mp4"),
            false,
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-hide_banner", "-nostdin", "-loglevel", "error", "-n", "-i", "v.mp4", "-i",
                "a.wav", "-map", "0:v:0", "-map", "1:a:0", "-c", "copy", "out.part.mp4"
            ]
        );

        let overwrite = mux_args(Path::new("v"), Path::new("a"), Path::new("o"), true);
        assert_eq!(overwrite[4], OsString::from("-y"));
    }

    #[tokio::test]
    async fn test_stitch_refuses_existing_output_without_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("clip.mp4");
        std::fs::write(&output, b"keep me").unwrap();

        let stitcher = Stitcher::new(Transcoder::new("/nonexistent/ffmpeg", "ffprobe"));
        let err = stitcher
            .stitch(Path::new("v.mp4"), Path::new("a.wav"), &output, false)
            .await
            .unwrap_err();

        assert!(matches!(err, StitchError::OutputExists { .. }));
        assert_eq!(std::fs::read(&output).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_stitch_engine_failure_propagates_and_leaves_no_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("clip.mp4");

        let stitcher = Stitcher::new(Transcoder::new("/nonexistent/ffmpeg", "ffprobe"));
        let err = stitcher
            .stitch(Path::new("v.mp4"), Path::new("a.wav"), &output, true)
            .await
            .unwrap_err();

        assert!(matches!(err, StitchError::Engine(TranscodeError::Spawn { .. })));
        assert!(!output.exists());
        assert!(!dir.path().join("clip.part.mp4").exists());
    }
}
