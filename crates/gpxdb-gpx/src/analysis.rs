//! Track statistics
//!
//! Distances are summed per segment; no distance is counted across segment
//! boundaries. A pair of consecutive points counts as moving when its speed
//! reaches [`MOVING_SPEED_THRESHOLD`].

use crate::document::GpxDocument;
use crate::geo::haversine_distance;
use gpxdb_common::TrackAnalysis;
use std::collections::BTreeSet;

/// Minimum speed (m/s) for a point pair to count as moving
pub const MOVING_SPEED_THRESHOLD: f64 = 0.1;

/// Compute the analysis of a parsed document
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub fn analyze(doc: &GpxDocument) -> TrackAnalysis {
    let mut a = TrackAnalysis {
        total_tracks: doc
            .tracks
            .iter()
            .filter(|t| t.segments.iter().any(|s| !s.points.is_empty()))
            .count() as i64,
        wpt_points: doc.waypoints.len() as i64,
        ..TrackAnalysis::default()
    };

    let mut start_time = i64::MAX;
    let mut end_time = i64::MIN;
    let mut elevation_sum = 0.0;
    let mut elevation_count = 0u64;
    let mut min_elevation = f64::INFINITY;
    let mut max_elevation = f64::NEG_INFINITY;

    for points in doc.segments() {
        if a.start_location.is_none() {
            a.start_location = Some((points[0].lat, points[0].lon));
        }
        let mut prev_elevation: Option<f64> = None;

        for (i, point) in points.iter().enumerate() {
            a.points += 1;

            if let Some(t) = point.timestamp_millis() {
                start_time = start_time.min(t);
                end_time = end_time.max(t);
            }

            if let Some(ele) = point.elevation {
                elevation_sum += ele;
                elevation_count += 1;
                min_elevation = min_elevation.min(ele);
                max_elevation = max_elevation.max(ele);
                if let Some(prev) = prev_elevation {
                    let diff = ele - prev;
                    if diff > 0.0 {
                        a.diff_elevation_up += diff;
                    } else {
                        a.diff_elevation_down -= diff;
                    }
                }
                prev_elevation = Some(ele);
            }

            if i == 0 {
                continue;
            }
            let prev = &points[i - 1];
            let distance = haversine_distance(prev.lat, prev.lon, point.lat, point.lon);
            a.total_distance += distance;

            if let (Some(t0), Some(t1)) = (prev.timestamp_millis(), point.timestamp_millis()) {
                let dt = t1 - t0;
                if dt > 0 {
                    let speed = distance / (dt as f64 / 1000.0);
                    a.max_speed = a.max_speed.max(speed);
                    if speed >= MOVING_SPEED_THRESHOLD {
                        a.time_moving += dt;
                        a.total_distance_moving += distance;
                    }
                }
            }
        }
    }

    if start_time <= end_time {
        a.start_time = start_time;
        a.end_time = end_time;
        a.time_span = end_time - start_time;
    }
    if elevation_count > 0 {
        a.avg_elevation = elevation_sum / elevation_count as f64;
        a.min_elevation = min_elevation;
        a.max_elevation = max_elevation;
    }
    if a.time_moving > 0 {
        a.avg_speed = a.total_distance_moving / (a.time_moving as f64 / 1000.0);
    }
    if a.start_location.is_none() {
        a.start_location = doc.waypoints.first().map(|w| (w.lat, w.lon));
    }

    let categories: BTreeSet<&str> = doc
        .waypoints
        .iter()
        .filter_map(|w| w.category.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if !categories.is_empty() {
        a.wpt_category_names = Some(categories.into_iter().collect::<Vec<_>>().join(","));
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(xml: &str) -> GpxDocument {
        GpxDocument::parse_str(xml).unwrap()
    }

    #[test]
    fn test_two_point_track() {
        let a = analyze(&doc(
            r#"<gpx><trk><trkseg>
                <trkpt lat="0" lon="0"><ele>10</ele><time>1970-01-01T00:00:00Z</time></trkpt>
                <trkpt lat="0.001" lon="0"><ele>15</ele><time>1970-01-01T00:01:40Z</time></trkpt>
                <trkpt lat="0.002" lon="0"><ele>12</ele><time>1970-01-01T00:03:20Z</time></trkpt>
            </trkseg></trk></gpx>"#,
        ));
        assert_eq!(a.points, 3);
        assert_eq!(a.total_tracks, 1);
        assert!((a.total_distance - 222.39).abs() < 0.1, "got {}", a.total_distance);
        assert_eq!(a.time_span, 200_000);
        assert_eq!(a.time_moving, 200_000);
        assert!((a.max_speed - 1.1119).abs() < 0.001);
        assert!((a.avg_speed - 1.1119).abs() < 0.001);
        assert!((a.diff_elevation_up - 5.0).abs() < f64::EPSILON);
        assert!((a.diff_elevation_down - 3.0).abs() < f64::EPSILON);
        assert!((a.min_elevation - 10.0).abs() < f64::EPSILON);
        assert!((a.max_elevation - 15.0).abs() < f64::EPSILON);
        assert_eq!(a.start_location, Some((0.0, 0.0)));
    }

    #[test]
    fn test_standing_still_is_not_moving() {
        let a = analyze(&doc(
            r#"<gpx><trk><trkseg>
                <trkpt lat="1" lon="1"><time>1970-01-01T00:00:00Z</time></trkpt>
                <trkpt lat="1" lon="1"><time>1970-01-01T00:10:00Z</time></trkpt>
            </trkseg></trk></gpx>"#,
        ));
        assert_eq!(a.time_span, 600_000);
        assert_eq!(a.time_moving, 0);
        assert!(a.avg_speed.abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_distance_across_segments() {
        let a = analyze(&doc(
            r#"<gpx><trk>
                <trkseg><trkpt lat="0" lon="0"/></trkseg>
                <trkseg><trkpt lat="10" lon="10"/></trkseg>
            </trk></gpx>"#,
        ));
        assert_eq!(a.points, 2);
        assert!(a.total_distance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_waypoint_only_file() {
        let a = analyze(&doc(
            r#"<gpx>
                <wpt lat="48.1" lon="11.5"><type>fuel</type></wpt>
                <wpt lat="48.2" lon="11.6"><type>cafe</type></wpt>
                <wpt lat="48.3" lon="11.7"><type>fuel</type></wpt>
            </gpx>"#,
        ));
        assert_eq!(a.points, 0);
        assert_eq!(a.wpt_points, 3);
        assert_eq!(a.total_tracks, 0);
        assert_eq!(a.wpt_category_names.as_deref(), Some("cafe,fuel"));
        assert_eq!(a.start_location, Some((48.1, 11.5)));
    }

    #[test]
    fn test_empty_document() {
        let a = analyze(&doc("<gpx></gpx>"));
        assert!(a.is_empty());
        assert_eq!(a, TrackAnalysis::default());
    }
}
