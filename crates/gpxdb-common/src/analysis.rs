//! Derived statistics of a parsed track file.

use serde::{Deserialize, Serialize};

/// Result of analysing one GPX file.
///
/// Times are milliseconds since the Unix epoch, durations are milliseconds,
/// distances are metres, speeds are metres per second.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackAnalysis {
    pub total_distance: f64,
    pub total_tracks: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub time_span: i64,
    pub time_moving: i64,
    pub total_distance_moving: f64,
    pub diff_elevation_up: f64,
    pub diff_elevation_down: f64,
    pub avg_elevation: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
    pub max_speed: f64,
    pub avg_speed: f64,
    pub points: i64,
    pub wpt_points: i64,
    /// Comma separated, sorted waypoint categories.
    pub wpt_category_names: Option<String>,
    /// Latitude/longitude of the first track point.
    pub start_location: Option<(f64, f64)>,
}

impl TrackAnalysis {
    /// True when the file contained no track points and no waypoints.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points == 0 && self.wpt_points == 0
    }

    #[must_use]
    pub fn has_elevation(&self) -> bool {
        self.max_elevation > self.min_elevation
    }
}
