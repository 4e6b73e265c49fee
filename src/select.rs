//! Best-stream selection over a catalog listing.
//!
//! Both selectors pick the highest `rank` among the eligible descriptors.
//! Equal ranks resolve to the first-listed descriptor so that selection is
//! deterministic for a given catalog order.

use thiserror::Error;

use crate::catalog::{StreamDescriptor, StreamKind};

/// Container selected when none is configured.
pub const DEFAULT_CONTAINER: &str = "mp4";

/// Errors produced by stream selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// No descriptor matched the selection criteria.
    #[error("no {kind} stream available in container '{container}'")]
    NoStreamAvailable {
        /// Kind of stream that was requested.
        kind: StreamKind,
        /// Container that was requested.
        container: String,
    },
}

/// Selects the highest-bitrate audio stream in `container`.
///
/// # Errors
///
/// Returns [`SelectError::NoStreamAvailable`] when no audio stream uses `container`.
pub fn select_audio<'a>(
    streams: &'a [StreamDescriptor],
    container: &str,
) -> Result<&'a StreamDescriptor, SelectError> {
    best_by_rank(
        streams
            .iter()
            .filter(|s| s.kind == StreamKind::Audio && matches_container(s, container)),
    )
    .ok_or_else(|| SelectError::NoStreamAvailable {
        kind: StreamKind::Audio,
        container: container.to_string(),
    })
}

/// Selects the highest-resolution adaptive video stream in `container`.
///
/// Progressive (muxed audio+video) streams are never selected.
///
/// # Errors
///
/// Returns [`SelectError::NoStreamAvailable`] when no adaptive video stream uses `container`.
pub fn select_video<'a>(
    streams: &'a [StreamDescriptor],
    container: &str,
) -> Result<&'a StreamDescriptor, SelectError> {
    best_by_rank(
        streams
            .iter()
            .filter(|s| s.kind == StreamKind::Video && s.adaptive && matches_container(s, container)),
    )
    .ok_or_else(|| SelectError::NoStreamAvailable {
        kind: StreamKind::Video,
        container: container.to_string(),
    })
}

fn matches_container(stream: &StreamDescriptor, container: &str) -> bool {
    stream.container.eq_ignore_ascii_case(container)
}

// `Iterator::max_by_key` keeps the *last* maximum; selection must keep the first.
fn best_by_rank<'a>(
    candidates: impl Iterator<Item = &'a StreamDescriptor>,
) -> Option<&'a StreamDescriptor> {
    candidates.reduce(|best, next| if next.rank > best.rank { next } else { best })
}
