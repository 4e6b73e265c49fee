//! Error types for catalog lookups.

use thiserror::Error;

/// Errors raised while querying the video catalog.
///
/// Every variant is fatal to an acquisition run: the pipeline maps them to
/// `AcquisitionError::SourceUnavailable` without retrying.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog helper program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog helper ran but reported a failure.
    #[error("{program} exited with status {status} for {url}: {stderr}")]
    Exited {
        /// Program that failed.
        program: String,
        /// Source URL being queried.
        url: String,
        /// Exit code, or -1 when terminated by a signal.
        status: i32,
        /// Last lines of the helper's stderr.
        stderr: String,
    },

    /// The catalog response could not be decoded.
    #[error("malformed catalog response for {url}: {source}")]
    Parse {
        /// Source URL being queried.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The source is not known to the catalog.
    #[error("source not found in catalog: {url}")]
    NotFound {
        /// Source URL being queried.
        url: String,
    },
}

impl CatalogError {
    /// Creates a spawn error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }
}
