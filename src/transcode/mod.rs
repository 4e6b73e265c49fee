//! Process runner for the external transcoding engine.
//!
//! [`Transcoder`] invokes `ffmpeg` and `ffprobe` as black-box child processes.
//! Children are killed when the awaiting future is dropped, so cancelling a
//! run never leaves an orphaned encoder behind.
//!
//! [`PartialOutput`] is the write-then-rename guard used by every producer of
//! a canonical output file: the engine writes to a sibling `.part` file which
//! is renamed onto the target only after success, and removed otherwise.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

/// Number of stderr lines kept in error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Errors raised while running the transcoding engine.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The engine binary could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and exited unsuccessfully.
    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, or -1 when terminated by a signal.
        status: i32,
        /// Last lines of the engine's stderr.
        stderr: String,
    },

    /// The probe ran but its output was not a duration.
    #[error("could not read duration of {path}: unexpected probe output '{output}'")]
    UnreadableDuration {
        /// File that was probed.
        path: PathBuf,
        /// What the probe printed.
        output: String,
    },
}

/// Handle on the `ffmpeg`/`ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Transcoder {
    /// Creates a transcoder using the given binaries (names are looked up in `PATH`).
    #[must_use]
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Runs `ffmpeg` with `args`, capturing stderr for error reports.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError::Spawn`] if the binary cannot be started and
    /// [`TranscodeError::Failed`] on a non-zero exit.
    #[instrument(level = "debug", skip(self, args), fields(program = %self.ffmpeg.display()))]
    pub async fn run_ffmpeg(&self, args: Vec<OsString>) -> Result<(), TranscodeError> {
        debug!(?args, "running ffmpeg");
        let program = self.ffmpeg.display().to_string();
        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        Err(TranscodeError::Failed {
            program,
            status: output.status.code().unwrap_or(-1),
            stderr: stderr_tail(&output.stderr),
        })
    }

    /// Reads the container duration of `path` with `ffprobe`.
    ///
    /// # Errors
    ///
    /// Returns [`TranscodeError`] when the probe cannot run, fails, or prints
    /// something other than a non-negative number of seconds.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub async fn probe_duration(&self, path: &Path) -> Result<Duration, TranscodeError> {
        let program = self.ffprobe.display().to_string();
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TranscodeError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TranscodeError::Failed {
                program,
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let printed = String::from_utf8_lossy(&output.stdout).trim().to_string();
        parse_duration(&printed).ok_or_else(|| TranscodeError::UnreadableDuration {
            path: path.to_path_buf(),
            output: printed,
        })
    }
}

fn parse_duration(printed: &str) -> Option<Duration> {
    let first_line = printed.lines().next()?.trim();
    let seconds: f64 = first_line.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// Keeps the last lines of a child's stderr, joined on one line.
pub(crate) fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

/// Write-then-rename guard for a canonical output path.
///
/// The guard owns a sibling `<stem>.part<ext>` path. Dropping it without
/// [`commit`](Self::commit) removes whatever was written there.
#[derive(Debug)]
pub struct PartialOutput {
    partial: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl PartialOutput {
    /// Reserves the partial path for `target`, removing a stale one left by
    /// an interrupted earlier run.
    ///
    /// # Errors
    ///
    /// Returns the IO error if a stale partial file exists and cannot be removed.
    pub fn for_target(target: &Path) -> std::io::Result<Self> {
        let partial = partial_path(target);
        match std::fs::remove_file(&partial) {
            Ok(()) => debug!(path = %partial.display(), "removed stale partial output"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        Ok(Self {
            partial,
            target: target.to_path_buf(),
            committed: false,
        })
    }

    /// Path the engine should write to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.partial
    }

    /// Size of the partial file, or 0 when nothing was written.
    #[must_use]
    pub fn written_len(&self) -> u64 {
        std::fs::metadata(&self.partial).map_or(0, |m| m.len())
    }

    /// Renames the partial file onto the target, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns the IO error from the rename; the partial file is then removed on drop.
    pub fn commit(mut self) -> std::io::Result<PathBuf> {
        std::fs::rename(&self.partial, &self.target)?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.partial) {
            Ok(()) => debug!(path = %self.partial.display(), "discarded partial output"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!(
                path = %self.partial.display(),
                error = %err,
                "failed to discard partial output"
            ),
        }
    }
}

/// `movie.mp4` → `movie.part.mp4`; the extension is kept so the engine can
/// infer the output container from the file name.
fn partial_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy().into_owned());
    let name = match target.extension() {
        Some(ext) => format!("{stem}.part.{}", ext.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    target.with_file_name(name)
}
