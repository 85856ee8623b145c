//! Error types for GPXDB
//!
//! This module defines the common error types used throughout the system.

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for GPXDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for GPXDB
#[derive(Debug, Error)]
pub enum Error {
    // Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Record errors
    #[error("no record for {}", .0.display())]
    ItemNotFound(PathBuf),

    #[error("parameter {parameter} does not accept {value}")]
    TypeMismatch { parameter: String, value: String },

    // Track parsing errors
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    // Persistence errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a parse error for a track file
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if this is a not found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ItemNotFound(_))
    }

    /// Check if the failure came from the persistent store
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}
