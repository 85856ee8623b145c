//! GPXDB GPX - track file parsing and analysis
//!
//! This crate turns raw GPX documents into [`TrackAnalysis`] values:
//! - XML decoding of waypoints, routes and tracks (quick-xml serde)
//! - distance, time, speed and elevation statistics
//! - the [`TrackAnalyzer`] seam used by the background reader

pub mod analysis;
pub mod analyzer;
pub mod document;
pub mod geo;

pub use analysis::analyze;
pub use analyzer::{GpxAnalyzer, TrackAnalyzer, TrackSummary};
pub use document::{GpxDocument, TrackPoint, Waypoint};
pub use gpxdb_common::TrackAnalysis;
