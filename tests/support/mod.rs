//! Shared fixtures for integration tests: an in-memory catalog and shell
//! stand-ins for the external media tools.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vidstitch_core::{Catalog, CatalogError, PipelineConfig, SourceMeta, StreamDescriptor};

/// Catalog serving a fixed listing and counting how often it is asked.
pub struct FakeCatalog {
    meta: SourceMeta,
    streams: Vec<StreamDescriptor>,
    available: bool,
    metadata_calls: AtomicUsize,
    listing_calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(title: &str, streams: Vec<StreamDescriptor>) -> Self {
        Self {
            meta: SourceMeta {
                title: title.to_string(),
                channel_url: Some("https://www.youtube.com/channel/UCfake".to_string()),
                duration: Duration::from_secs(212),
            },
            streams,
            available: true,
            metadata_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
        }
    }

    /// A catalog that fails every lookup.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new("unused", Vec::new())
        }
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn fetch_metadata(&self, url: &str) -> Result<SourceMeta, CatalogError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(CatalogError::not_found(url));
        }
        Ok(self.meta.clone())
    }

    async fn list_streams(&self, url: &str) -> Result<Vec<StreamDescriptor>, CatalogError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if !self.available {
            return Err(CatalogError::not_found(url));
        }
        Ok(self.streams.clone())
    }
}

/// Writes an executable shell script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod script");
    path
}

/// An `ffmpeg` stand-in that concatenates every `-i` input into the last argument.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg",
        r#"for last; do :; done
: > "$last"
while [ $# -gt 1 ]; do
  if [ "$1" = "-i" ]; then
    cat "$2" >> "$last"
    shift
  fi
  shift
done
"#,
    )
}

/// An `ffmpeg` stand-in that always fails the way a corrupt input does.
#[cfg(unix)]
pub fn failing_ffmpeg(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "ffmpeg-broken",
        "echo 'Invalid data found when processing input' >&2\nexit 1\n",
    )
}

/// An `ffprobe` stand-in reporting a fixed duration.
#[cfg(unix)]
pub fn fake_ffprobe(dir: &Path, seconds: f64) -> PathBuf {
    write_script(dir, "ffprobe", &format!("echo {seconds:.6}\n"))
}

/// A pipeline config rooted in `root`, using the given engine binaries.
pub fn config_in(root: &Path, ffmpeg: PathBuf, ffprobe: PathBuf) -> PipelineConfig {
    PipelineConfig {
        output_dir: root.join("downloads"),
        staging_root: root.join("temp"),
        ffmpeg,
        ffprobe,
        ..PipelineConfig::default()
    }
}

/// Entries left under a staging root; a missing root counts as empty.
pub fn staging_leftovers(staging_root: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(staging_root) {
        Ok(entries) => entries.map(|e| e.expect("dir entry").path()).collect(),
        Err(_) => Vec::new(),
    }
}
