//! Pipeline configuration and config-file loading.
//!
//! Values are layered: built-in defaults, then the optional TOML file, then
//! command-line overrides (applied by the binary).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::select::DEFAULT_CONTAINER;

/// Default directory for finished artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Default root for per-run staging directories.
pub const DEFAULT_STAGING_ROOT: &str = "temp";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// The config file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config file '{path}': {}", source.message())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// The TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// The offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Effective settings for an acquisition or subclip run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Where finished artifacts and their records are written.
    pub output_dir: PathBuf,
    /// Parent of the per-run staging directories.
    pub staging_root: PathBuf,
    /// Container both selected tracks must use.
    pub container: String,
    /// `ffmpeg` binary.
    pub ffmpeg: PathBuf,
    /// `ffprobe` binary.
    pub ffprobe: PathBuf,
    /// `yt-dlp` binary.
    pub yt_dlp: PathBuf,
    /// Download connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Download read timeout in seconds, applied to each read rather than the whole transfer.
    pub read_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            staging_root: PathBuf::from(DEFAULT_STAGING_ROOT),
            container: DEFAULT_CONTAINER.to_string(),
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            yt_dlp: PathBuf::from("yt-dlp"),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// TOML-backed file configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Default output directory.
    pub output_dir: Option<PathBuf>,
    /// Default staging root.
    pub staging_root: Option<PathBuf>,
    /// Target container, e.g. `"mp4"` or `"webm"`.
    pub container: Option<String>,
    /// `ffmpeg` binary.
    pub ffmpeg: Option<PathBuf>,
    /// `ffprobe` binary.
    pub ffprobe: Option<PathBuf>,
    /// `yt-dlp` binary.
    pub yt_dlp: Option<PathBuf>,
    /// Download connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: Option<u64>,
    /// Download read timeout in seconds (1..=3600).
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(container) = &self.container
            && container.trim().is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "container",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Overlays the values present in this file onto `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        if let Some(root) = &self.staging_root {
            config.staging_root.clone_from(root);
        }
        if let Some(container) = &self.container {
            config.container = container.trim().to_ascii_lowercase();
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            config.ffmpeg.clone_from(ffmpeg);
        }
        if let Some(ffprobe) = &self.ffprobe {
            config.ffprobe.clone_from(ffprobe);
        }
        if let Some(yt_dlp) = &self.yt_dlp {
            config.yt_dlp.clone_from(yt_dlp);
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout_secs = secs;
        }
    }
}

fn validate_timeout_secs(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is outside 1..=3600"),
        });
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/vidstitch/config.toml`
/// 2. `$HOME/.config/vidstitch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("vidstitch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("vidstitch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Reads, parses and validates the config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, is not valid TOML,
/// contains unknown keys, or fails validation.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads the config file from the default location, if one exists there.
///
/// # Errors
///
/// Returns [`ConfigError`] when a file exists but cannot be loaded.
pub fn load_default_file_config() -> Result<Option<FileConfig>, ConfigError> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_file_config(&path).map(Some)
}

fn parse_config_str(raw: &str) -> Result<FileConfig, toml::de::Error> {
    toml::from_str(raw)
}
