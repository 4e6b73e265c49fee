//! Provenance records written beside acquired files.
//!
//! Each artifact gets a `<stem>.json` sibling with the fields
//! `name, url, channel_url, length, download_time, download_time_took,
//! file_size, args`. Field names and the two time formats are a stable
//! interchange surface; existing consumers parse them.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors produced while recording metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The artifact is missing or empty, so there is nothing to describe.
    #[error("refusing to record metadata for missing or empty artifact {path}")]
    InvalidArtifact {
        /// The artifact path.
        path: PathBuf,
    },

    /// A record already exists and overwriting was not requested.
    #[error("metadata record already exists: {path}")]
    AlreadyExists {
        /// The existing record.
        path: PathBuf,
    },

    /// Writing the record failed.
    #[error("IO error writing metadata {path}: {source}")]
    Io {
        /// The record path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (shouldn't occur for well-formed structs).
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The request parameters that produced an artifact, recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestArgs {
    /// Source URL as given.
    pub url: String,
    /// Requested subclip start, in seconds.
    pub start: u64,
    /// Requested subclip end, in seconds (0 when no subclip was requested).
    pub end: u64,
    /// Audio-only mode.
    pub audio_only: bool,
    /// Video-only mode.
    pub video_only: bool,
    /// Overwrite flag.
    pub overwrite: bool,
}

/// A finished output file and its provenance.
#[derive(Debug, Clone)]
pub struct OutputArtifact {
    /// Final location of the file.
    pub path: PathBuf,
    /// Size on disk when the artifact was captured.
    pub size_bytes: u64,
    /// Source URL.
    pub source_url: String,
    /// Channel or uploader reference, when the catalog knows it.
    pub channel_url: Option<String>,
    /// Nominal duration reported by the catalog.
    pub duration: Duration,
    /// Wall-clock time the acquisition took.
    pub download_elapsed: Duration,
    /// When the artifact was completed.
    pub created_at: DateTime<Local>,
    /// Parameters of the originating request.
    pub args: RequestArgs,
}

#[derive(Debug, Serialize)]
struct MetadataRecord<'a> {
    name: String,
    url: &'a str,
    channel_url: Option<&'a str>,
    length: String,
    download_time: String,
    download_time_took: String,
    file_size: String,
    args: &'a RequestArgs,
}

impl<'a> From<&'a OutputArtifact> for MetadataRecord<'a> {
    fn from(artifact: &'a OutputArtifact) -> Self {
        Self {
            name: artifact
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            url: &artifact.source_url,
            channel_url: artifact.channel_url.as_deref(),
            length: format_hms(artifact.duration),
            download_time: format_timestamp(&artifact.created_at),
            download_time_took: format_hms(artifact.download_elapsed),
            file_size: format_file_size(artifact.size_bytes),
            args: &artifact.args,
        }
    }
}

/// Writes the metadata record for `artifact` and returns its path.
///
/// The record is written to a temporary file in the destination directory
/// and renamed into place, so readers never observe a partial record.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidArtifact`] if the artifact file is missing
/// or empty, [`MetadataError::AlreadyExists`] if a record exists and
/// `overwrite` is false, and IO/serialization errors otherwise.
#[instrument(skip(artifact), fields(path = %artifact.path.display()))]
pub fn record(artifact: &OutputArtifact, overwrite: bool) -> Result<PathBuf, MetadataError> {
    let artifact_len = fs::metadata(&artifact.path).map_or(0, |m| m.len());
    if artifact_len == 0 {
        return Err(MetadataError::InvalidArtifact {
            path: artifact.path.clone(),
        });
    }

    let record_path = derive_metadata_path(&artifact.path);
    if !overwrite && record_path.exists() {
        return Err(MetadataError::AlreadyExists { path: record_path });
    }

    let dir = match record_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |source| MetadataError::Io {
        path: record_path.clone(),
        source,
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &MetadataRecord::from(artifact))?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;
    }

    let persisted = if overwrite {
        staged.persist(&record_path)
    } else {
        staged.persist_noclobber(&record_path)
    };
    match persisted {
        Ok(_) => {}
        Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
            return Err(MetadataError::AlreadyExists {
                path: record_path.clone(),
            });
        }
        Err(err) => return Err(io_err(err.error)),
    }

    debug!(record = %record_path.display(), "metadata recorded");
    Ok(record_path)
}

/// Derives the record path from an artifact path.
///
/// Examples:
/// - `downloads/Talk.mp4` → `downloads/Talk.json`
/// - `downloads/Talk.wav` → `downloads/Talk.json`
#[must_use]
pub fn derive_metadata_path(artifact: &Path) -> PathBuf {
    artifact.with_extension("json")
}

/// Renders a duration as `HH:MM:SS`.
///
/// Hours are zero-padded to two digits and keep counting past 24.
/// Sub-second remainders are truncated.
#[must_use]
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Renders a local timestamp as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Renders a byte count as whole binary megabytes, truncated (`"3MB"`).
#[must_use]
pub fn format_file_size(bytes: u64) -> String {
    format!("{}MB", bytes >> 20)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args() -> RequestArgs {
        RequestArgs {
            url: "https://youtu.be/abc".to_string(),
            start: 0,
            end: 0,
            audio_only: false,
            video_only: false,
            overwrite: false,
        }
    }

    fn artifact_at(path: PathBuf) -> OutputArtifact {
        let size_bytes = fs::metadata(&path).map_or(0, |m| m.len());
        OutputArtifact {
            path,
            size_bytes,
            source_url: "https://youtu.be/abc".to_string(),
            channel_url: Some("https://www.youtube.com/channel/UC1".to_string()),
            duration: Duration::from_secs(3725),
            download_elapsed: Duration::from_millis(65_900),
            created_at: Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap(),
            args: args(),
        }
    }

    #[test]
    fn test_format_hms_is_fixed_width() {
        assert_eq!(format_hms(Duration::ZERO), "00:00:00");
        assert_eq!(format_hms(Duration::from_millis(59_999)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_hms(Duration::from_secs(25 * 3600)), "25:00:00");
    }

    #[test]
    fn test_format_timestamp_layout() {
        let ts = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-09 07:05:02");
    }

    #[test]
    fn test_format_file_size_truncates_binary_megabytes() {
        assert_eq!(format_file_size(0), "0MB");
        assert_eq!(format_file_size((1 << 20) - 1), "0MB");
        assert_eq!(format_file_size(1 << 20), "1MB");
        assert_eq!(format_file_size(5 * (1 << 20) + 1_048_575), "5MB");
    }

    #[test]
    fn test_derive_metadata_path_replaces_extension() {
        assert_eq!(
            derive_metadata_path(Path::new("downloads/Talk.wav")),
            PathBuf::from("downloads/Talk.json")
        );
        assert_eq!(
            derive_metadata_path(Path::new("Talk v1.2.mp4")),
            PathBuf::from("Talk v1.2.json")
        );
    }

    #[test]
    fn test_record_writes_expected_fields() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("Talk.mp4");
        fs::write(&media, vec![7_u8; 3 * 1024 * 1024 + 5]).unwrap();

        let path = record(&artifact_at(media), false).unwrap();

        assert_eq!(path, dir.path().join("Talk.json"));
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["name"], "Talk.mp4");
        assert_eq!(value["url"], "https://youtu.be/abc");
        assert_eq!(value["channel_url"], "https://www.youtube.com/channel/UC1");
        assert_eq!(value["length"], "01:02:05");
        assert_eq!(value["download_time"], "2024-03-09 07:05:02");
        assert_eq!(value["download_time_took"], "00:01:05");
        assert_eq!(value["file_size"], "3MB");
        assert_eq!(value["args"]["audio_only"], false);
        assert_eq!(value["args"]["video_only"], false);
        assert_eq!(value["args"]["overwrite"], false);

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        let mut expected = vec![
            "name",
            "url",
            "channel_url",
            "length",
            "download_time",
            "download_time_took",
            "file_size",
            "args",
        ];
        expected.sort_unstable();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_record_refuses_missing_or_empty_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("never.mp4");
        assert!(matches!(
            record(&artifact_at(missing), true),
            Err(MetadataError::InvalidArtifact { .. })
        ));

        let empty = dir.path().join("empty.mp4");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            record(&artifact_at(empty), true),
            Err(MetadataError::InvalidArtifact { .. })
        ));
        assert!(!dir.path().join("empty.json").exists());
        assert!(!dir.path().join("never.json").exists());
    }

    #[test]
    fn test_record_respects_overwrite_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("Talk.mp4");
        fs::write(&media, b"media").unwrap();
        let existing = dir.path().join("Talk.json");
        fs::write(&existing, b"{\"old\": true}").unwrap();

        let err = record(&artifact_at(media.clone()), false).unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists { .. }));
        assert_eq!(fs::read_to_string(&existing).unwrap(), "{\"old\": true}");

        record(&artifact_at(media), true).unwrap();
        assert!(fs::read_to_string(&existing).unwrap().contains("\"name\""));
    }

    #[test]
    fn test_record_leaves_no_temp_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let media = dir.path().join("Talk.mp4");
        fs::write(&media, b"media").unwrap();
        record(&artifact_at(media), false).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Talk.json", "Talk.mp4"]);
    }
}
