//! Configuration types for GPXDB
//!
//! This module defines configuration structures used across components.
//! Every field has a default so partial configuration files are accepted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for GPXDB
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Track directory configuration
    #[serde(default)]
    pub tracks: TracksConfig,
    /// Persistent store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Background reader configuration
    #[serde(default)]
    pub reader: ReaderConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject settings the cache cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tracks.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(Error::configuration("tracks.extensions must name at least one extension"));
        }
        if self.tracks.extensions.iter().any(|e| e.starts_with('.')) {
            return Err(Error::configuration("tracks.extensions are given without the leading dot"));
        }
        if self.reader.wait_timeout_secs == 0 {
            return Err(Error::configuration("reader.wait_timeout_secs must be positive"));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(Error::configuration("store.path must not be empty"));
        }
        Ok(())
    }
}

/// Where track files live
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TracksConfig {
    /// Root directory scanned for untracked files
    #[serde(default = "default_tracks_dir")]
    pub dir: PathBuf,
    /// File extensions (without dot) treated as tracks
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Descend into subdirectories
    #[serde(default = "default_true")]
    pub recursive: bool,
}

impl Default for TracksConfig {
    fn default() -> Self {
        Self {
            dir: default_tracks_dir(),
            extensions: default_extensions(),
            recursive: true,
        }
    }
}

impl TracksConfig {
    /// Config rooted at `dir` with default extensions
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }
}

/// Persistent store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the database file
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Background reader configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// How long callers wait for the reader to go idle (seconds)
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: default_wait_timeout_secs(),
        }
    }
}

impl ReaderConfig {
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_tracks_dir() -> PathBuf {
    PathBuf::from("./tracks")
}

fn default_extensions() -> Vec<String> {
    vec!["gpx".to_string()]
}

const fn default_true() -> bool {
    true
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./gpxdb/gpx.redb")
}

const fn default_wait_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}
