//! Run-scoped staging directory.
//!
//! Every acquisition run gets its own `run-<uuid>` directory under the
//! staging root. The directory is removed when the [`StagingArea`] is closed,
//! or, if the owning future is cancelled or panics first, when it is dropped.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Errors raised while creating or clearing a staging area.
#[derive(Debug, Error)]
pub enum StagingError {
    /// A filesystem operation failed.
    #[error("staging IO error at {path}: {source}")]
    Io {
        /// Path being created or removed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A subdirectory appeared in the staging area; it is not removed recursively.
    #[error("unexpected directory in staging area: {path}")]
    UnexpectedEntry {
        /// The offending entry.
        path: PathBuf,
    },
}

impl StagingError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Temporary directory owned by exactly one acquisition run.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    closed: bool,
}

impl StagingArea {
    /// Creates a fresh, uniquely named directory under `staging_root`.
    ///
    /// The root itself is created when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] if either directory cannot be created.
    #[instrument(level = "debug", fields(root = %staging_root.display()))]
    pub fn open(staging_root: &Path) -> Result<Self, StagingError> {
        fs::create_dir_all(staging_root).map_err(|e| StagingError::io(staging_root, e))?;
        let dir = staging_root.join(format!("run-{}", Uuid::new_v4().simple()));
        fs::create_dir(&dir).map_err(|e| StagingError::io(&dir, e))?;
        debug!(dir = %dir.display(), "staging area created");
        Ok(Self {
            dir,
            closed: false,
        })
    }

    /// The staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Removes every file in the staging area and then the directory itself.
    ///
    /// Symlinks are removed without touching their targets.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Io`] when an entry cannot be removed, and
    /// [`StagingError::UnexpectedEntry`] when a subdirectory is found. In both
    /// cases the remaining files are still removed.
    #[instrument(level = "debug", skip(self), fields(dir = %self.dir.display()))]
    pub fn close(mut self) -> Result<(), StagingError> {
        self.closed = true;
        let removed = clear_dir(&self.dir)?;
        debug!(removed, "staging area removed");
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match clear_dir(&self.dir) {
            Ok(removed) => debug!(
                dir = %self.dir.display(),
                removed,
                "staging area removed on drop"
            ),
            Err(error) => warn!(
                dir = %self.dir.display(),
                error = %error,
                "failed to remove staging area on drop"
            ),
        }
    }
}

/// Removes the regular files and symlinks directly inside `dir`, then `dir`.
///
/// A missing `dir` counts as already cleared.
fn clear_dir(dir: &Path) -> Result<usize, StagingError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(StagingError::io(dir, err)),
    };

    let mut removed = 0;
    let mut first_error = None;
    for entry in entries {
        let entry = entry.map_err(|e| StagingError::io(dir, e))?;
        let path = entry.path();
        // `DirEntry::file_type` does not follow symlinks.
        let outcome = match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => Err(StagingError::UnexpectedEntry { path }),
            Ok(_) => fs::remove_file(&path).map_err(|e| StagingError::io(&path, e)),
            Err(err) => Err(StagingError::io(&path, err)),
        };
        match outcome {
            Ok(()) => removed += 1,
            Err(error) => {
                first_error.get_or_insert(error);
            }
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }
    fs::remove_dir(dir).map_err(|e| StagingError::io(dir, e))?;
    Ok(removed)
}
