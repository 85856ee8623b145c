//! Track directory scanning

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A track file found on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackFile {
    pub path: PathBuf,
    pub size: u64,
    /// Modification time in milliseconds since the epoch
    pub last_modified: i64,
}

/// Modification time of `path` in milliseconds, `None` if it is not a
/// readable regular file.
#[must_use]
pub fn file_modified_millis(path: &Path) -> Option<i64> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    let modified = meta.modified().ok()?;
    let millis = modified.duration_since(UNIX_EPOCH).ok()?.as_millis();
    i64::try_from(millis).ok()
}

/// Whether `path` has one of `extensions` (case-insensitive, no dot)
#[must_use]
pub fn has_track_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
}

/// List track files under `root`, sorted by path.
///
/// Hidden files and directories are skipped. A missing root yields an
/// empty list.
#[must_use]
pub fn scan_tracks(root: &Path, extensions: &[String], recursive: bool) -> Vec<TrackFile> {
    if !root.is_dir() {
        debug!("Track directory {} does not exist", root.display());
        return Vec::new();
    }

    let mut walker = WalkDir::new(root).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    let entries = walker
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_track_extension(entry.path(), extensions) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        files.push(TrackFile {
            path: entry.path().to_path_buf(),
            size: meta.len(),
            last_modified: file_modified_millis(entry.path()).unwrap_or(0),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("Found {} track files under {}", files.len(), root.display());
    files
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
