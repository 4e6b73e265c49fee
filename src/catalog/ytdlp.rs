//! Catalog backend that asks `yt-dlp` for the stream listing.
//!
//! One `yt-dlp --dump-single-json` call per source URL is enough for both
//! [`Catalog::fetch_metadata`] and [`Catalog::list_streams`]; the decoded
//! listing is cached for the lifetime of the catalog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use super::{Catalog, CatalogError, SourceMeta, StreamDescriptor};
use crate::transcode::stderr_tail;

/// `yt-dlp`-backed [`Catalog`].
#[derive(Debug)]
pub struct YtDlpCatalog {
    program: PathBuf,
    cache: Mutex<HashMap<String, Arc<SourceListing>>>,
}

/// Decoded `--dump-single-json` output, trimmed to the fields we use.
#[derive(Debug, Deserialize)]
struct SourceListing {
    title: String,
    #[serde(default)]
    channel_url: Option<String>,
    #[serde(default)]
    uploader_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<FormatEntry>,
}

#[derive(Debug, Deserialize)]
struct FormatEntry {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    abr: Option<f64>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpCatalog {
    /// Creates a catalog that runs `program` (usually `yt-dlp`).
    #[must_use]
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn listing(&self, url: &str) -> Result<Arc<SourceListing>, CatalogError> {
        let mut cache = self.cache.lock().await;
        if let Some(listing) = cache.get(url) {
            return Ok(Arc::clone(listing));
        }

        let listing = Arc::new(self.query(url).await?);
        cache.insert(url.to_string(), Arc::clone(&listing));
        Ok(listing)
    }

    #[instrument(level = "debug", skip(self))]
    async fn query(&self, url: &str) -> Result<SourceListing, CatalogError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", "--"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CatalogError::spawn(program.clone(), e))?;

        if !output.status.success() {
            return Err(CatalogError::Exited {
                program,
                url: url.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let listing = parse_listing(&output.stdout, url)?;
        debug!(
            title = %listing.title,
            formats = listing.formats.len(),
            "catalog listing decoded"
        );
        Ok(listing)
    }
}

#[async_trait]
impl Catalog for YtDlpCatalog {
    async fn fetch_metadata(&self, url: &str) -> Result<SourceMeta, CatalogError> {
        let listing = self.listing(url).await?;
        Ok(source_meta(&listing))
    }

    async fn list_streams(&self, url: &str) -> Result<Vec<StreamDescriptor>, CatalogError> {
        let listing = self.listing(url).await?;
        Ok(descriptors(&listing))
    }
}

fn parse_listing(raw: &[u8], url: &str) -> Result<SourceListing, CatalogError> {
    serde_json::from_slice(raw).map_err(|source| CatalogError::Parse {
        url: url.to_string(),
        source,
    })
}

fn source_meta(listing: &SourceListing) -> SourceMeta {
    let duration = listing
        .duration
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO);
    SourceMeta {
        title: listing.title.clone(),
        channel_url: listing
            .channel_url
            .clone()
            .or_else(|| listing.uploader_url.clone()),
        duration,
    }
}

/// Maps `formats[]` to descriptors, keeping catalog order.
///
/// Formats without a plain HTTP(S) URL (HLS/DASH manifests, storyboards) are
/// skipped since the downloader fetches a single body per stream.
fn descriptors(listing: &SourceListing) -> Vec<StreamDescriptor> {
    listing.formats.iter().filter_map(descriptor).collect()
}

fn descriptor(format: &FormatEntry) -> Option<StreamDescriptor> {
    let url = format.url.as_deref()?;
    if !matches!(format.protocol.as_deref(), Some("https" | "http")) {
        return None;
    }

    let has_video = format.vcodec.as_deref().is_some_and(|c| c != "none");
    let has_audio = format.acodec.as_deref().is_some_and(|c| c != "none");
    let container = normalize_container(format.ext.as_deref()?);

    let mut descriptor = if has_video {
        StreamDescriptor::video(
            &format.format_id,
            container,
            format.height.unwrap_or(0),
            !has_audio,
            url,
        )
    } else if has_audio {
        StreamDescriptor::audio(&format.format_id, container, kbps(format.abr), url)
    } else {
        return None;
    };

    let mut headers: Vec<(String, String)> = format
        .http_headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    headers.sort();
    descriptor.headers = headers;
    Some(descriptor)
}

/// Collapses extension aliases onto their container family.
fn normalize_container(ext: &str) -> String {
    match ext.to_ascii_lowercase().as_str() {
        "m4a" | "m4v" | "mp4" => "mp4".to_string(),
        "weba" | "webm" => "webm".to_string(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn kbps(abr: Option<f64>) -> u32 {
    abr.filter(|v| v.is_finite() && *v > 0.0)
        .map_or(0, |v| v.round().min(f64::from(u32::MAX)) as u32)
}
