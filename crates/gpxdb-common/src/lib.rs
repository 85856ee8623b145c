//! GPXDB Common - Shared types and utilities
//!
//! This crate provides the record model, error definitions and
//! configuration used across all GPXDB components.

pub mod analysis;
pub mod config;
pub mod error;
pub mod types;

pub use analysis::TrackAnalysis;
pub use config::{Config, LoggingConfig, ReaderConfig, StoreConfig, TracksConfig};
pub use error::{Error, Result};
pub use types::*;
