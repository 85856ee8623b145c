//! GPXDB Cache - track metadata cache
//!
//! This crate implements the cache facade over the persistent store:
//! - In-memory cache keyed by file path, written through to the store
//! - Background reader that analyses stale or new files one at a time
//! - Completion callbacks for callers waiting on a read
//! - Directory scanning for untracked files
//! - Range filters over analysed records

pub mod callback;
pub mod city;
pub mod filters;
pub mod helper;
pub mod reader;
pub mod scan;

// Re-exports
pub use callback::GpxDataItemCallback;
pub use city::{CityResolver, NoCityResolver};
pub use filters::{FilterKind, MetricSystem, RangeFilter, TrackFilters};
pub use helper::{Appearance, GpsFilters, GpxDbHelper, LoadStats};
pub use reader::{GpxReader, ReadListener, ReaderState};
pub use scan::{TrackFile, scan_tracks};
