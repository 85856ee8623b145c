//! File-level analysis entry point.

use crate::analysis::analyze;
use crate::document::GpxDocument;
use gpxdb_common::{Result, TrackAnalysis};
use std::path::Path;
use tracing::debug;

/// What the reader learns from one file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackSummary {
    pub analysis: TrackAnalysis,
    /// Creation time declared by the file itself (ms)
    pub creation_time: Option<i64>,
}

/// Parses a track file into its summary.
///
/// Implementations run on the background reader thread and may block.
pub trait TrackAnalyzer: Send + Sync {
    fn analyze(&self, path: &Path) -> Result<TrackSummary>;
}

/// [`TrackAnalyzer`] for GPX 1.0/1.1 files
#[derive(Clone, Copy, Debug, Default)]
pub struct GpxAnalyzer;

impl TrackAnalyzer for GpxAnalyzer {
    fn analyze(&self, path: &Path) -> Result<TrackSummary> {
        let doc = GpxDocument::from_path(path)?;
        let analysis = analyze(&doc);
        debug!(
            "Analysed {}: {} points, {:.0} m",
            path.display(),
            analysis.points,
            analysis.total_distance
        );
        Ok(TrackSummary {
            creation_time: doc.creation_time(),
            analysis,
        })
    }
}
