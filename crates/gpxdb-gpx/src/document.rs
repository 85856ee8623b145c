//! GPX document model
//!
//! Only the elements used by the analysis are decoded; extensions and
//! unknown elements are skipped.

use chrono::{DateTime, NaiveDateTime};
use gpxdb_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Root `<gpx>` element
#[derive(Debug, Default, Deserialize)]
pub struct GpxDocument {
    #[serde(rename = "@creator", default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(rename = "wpt", default)]
    pub waypoints: Vec<Waypoint>,
    #[serde(rename = "rte", default)]
    pub routes: Vec<Route>,
    #[serde(rename = "trk", default)]
    pub tracks: Vec<Track>,
}

/// `<metadata>` element
#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

/// `<wpt>` element
#[derive(Debug, Deserialize)]
pub struct Waypoint {
    #[serde(rename = "@lat")]
    pub lat: f64,
    #[serde(rename = "@lon")]
    pub lon: f64,
    #[serde(default)]
    pub name: Option<String>,
    /// Category of the waypoint
    #[serde(rename = "type", default)]
    pub category: Option<String>,
}

/// `<rte>` element
#[derive(Debug, Default, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "rtept", default)]
    pub points: Vec<TrackPoint>,
}

/// `<trk>` element
#[derive(Debug, Default, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "trkseg", default)]
    pub segments: Vec<TrackSegment>,
}

/// `<trkseg>` element
#[derive(Debug, Default, Deserialize)]
pub struct TrackSegment {
    #[serde(rename = "trkpt", default)]
    pub points: Vec<TrackPoint>,
}

/// `<trkpt>` / `<rtept>` element
#[derive(Debug, Clone, Deserialize)]
pub struct TrackPoint {
    #[serde(rename = "@lat")]
    pub lat: f64,
    #[serde(rename = "@lon")]
    pub lon: f64,
    #[serde(rename = "ele", default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
}

impl TrackPoint {
    /// Point timestamp in milliseconds since the epoch
    #[must_use]
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.time.as_deref().and_then(parse_time)
    }
}

impl GpxDocument {
    /// Decode a GPX document from text
    pub fn parse_str(xml: &str) -> std::result::Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(xml)
    }

    /// Read and decode a GPX file
    pub fn from_path(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse_str(&xml).map_err(|e| Error::parse(path, e))
    }

    /// Creation time declared in `<metadata><time>`
    #[must_use]
    pub fn creation_time(&self) -> Option<i64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.time.as_deref())
            .and_then(parse_time)
    }

    /// Segments with at least one point, tracks first then routes
    pub fn segments(&self) -> impl Iterator<Item = &[TrackPoint]> {
        let tracks = self
            .tracks
            .iter()
            .flat_map(|t| t.segments.iter().map(|s| s.points.as_slice()));
        let routes = self.routes.iter().map(|r| r.points.as_slice());
        tracks.chain(routes).filter(|points| !points.is_empty())
    }
}

/// Parse an ISO 8601 timestamp, accepting a missing zone as UTC.
#[must_use]
pub fn parse_time(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc().timestamp_millis())
}
