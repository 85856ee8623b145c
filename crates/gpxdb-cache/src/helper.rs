//! Cache facade over the persistent track store
//!
//! [`GpxDbHelper`] keeps every known record in memory, keyed by file path.
//! Mutations are written to the store first and reach the cache only after
//! the store accepted them. Records that are missing, stale or lack a city
//! lookup are handed to the background [`GpxReader`]; its results flow back
//! through [`ReadListener`] and are written through the same way.

use crate::callback::GpxDataItemCallback;
use crate::city::{CityResolver, NoCityResolver};
use crate::reader::{
    GpxReader, ReadListener, ReaderState, is_analysis_needed, is_city_search_needed,
};
use crate::scan::{file_modified_millis, scan_tracks};
use dashmap::DashMap;
use gpxdb_common::{
    Error, GpxDataItem, GpxParameter, ParamValue, ParameterKind, Result, TrackAnalysis,
    TracksConfig,
};
use gpxdb_gpx::{GpxAnalyzer, TrackAnalyzer};
use gpxdb_store::{ItemStore, StoreResult};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Outcome of [`GpxDbHelper::load_gpx_items`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Stored records whose file still exists
    pub loaded: usize,
    /// Stored records dropped because their file is gone
    pub purged: usize,
    /// Untracked files found by the directory scan
    pub added: usize,
}

/// Point filters applied when a track is displayed. `NaN` means unset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GpsFilters {
    pub smoothing_threshold: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub min_altitude: f64,
    pub max_altitude: f64,
    pub max_hdop: f64,
}

impl Default for GpsFilters {
    fn default() -> Self {
        Self {
            smoothing_threshold: f64::NAN,
            min_speed: f64::NAN,
            max_speed: f64::NAN,
            min_altitude: f64::NAN,
            max_altitude: f64::NAN,
            max_hdop: f64::NAN,
        }
    }
}

impl GpsFilters {
    #[must_use]
    pub fn from_item(item: &GpxDataItem) -> Self {
        let value = |p| item.value(p).as_f64().unwrap_or(f64::NAN);
        Self {
            smoothing_threshold: value(GpxParameter::SmoothingThreshold),
            min_speed: value(GpxParameter::MinFilterSpeed),
            max_speed: value(GpxParameter::MaxFilterSpeed),
            min_altitude: value(GpxParameter::MinFilterAltitude),
            max_altitude: value(GpxParameter::MaxFilterAltitude),
            max_hdop: value(GpxParameter::MaxFilterHdop),
        }
    }

    fn to_parameters(self) -> Vec<(GpxParameter, ParamValue)> {
        vec![
            (GpxParameter::SmoothingThreshold, self.smoothing_threshold.into()),
            (GpxParameter::MinFilterSpeed, self.min_speed.into()),
            (GpxParameter::MaxFilterSpeed, self.max_speed.into()),
            (GpxParameter::MinFilterAltitude, self.min_altitude.into()),
            (GpxParameter::MaxFilterAltitude, self.max_altitude.into()),
            (GpxParameter::MaxFilterHdop, self.max_hdop.into()),
        ]
    }
}

/// How a track is drawn
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Appearance {
    /// ARGB colour, `None` for the default
    pub color: Option<i64>,
    pub width: Option<String>,
    pub show_arrows: bool,
    pub show_start_finish: bool,
    pub split_type: i64,
    pub split_interval: f64,
    pub coloring_type: Option<String>,
}

impl Appearance {
    #[must_use]
    pub fn from_item(item: &GpxDataItem) -> Self {
        let text = |p| item.value(p).as_str().map(ToString::to_string);
        Self {
            color: item.value(GpxParameter::Color).as_i64(),
            width: text(GpxParameter::Width),
            show_arrows: item.value(GpxParameter::ShowArrows).as_bool().unwrap_or(false),
            show_start_finish: item
                .value(GpxParameter::ShowStartFinish)
                .as_bool()
                .unwrap_or(false),
            split_type: item.value(GpxParameter::SplitType).as_i64().unwrap_or(0),
            split_interval: item.value(GpxParameter::SplitInterval).as_f64().unwrap_or(0.0),
            coloring_type: text(GpxParameter::ColoringType),
        }
    }

    fn to_parameters(&self) -> Vec<(GpxParameter, ParamValue)> {
        vec![
            (GpxParameter::Color, self.color.into()),
            (GpxParameter::Width, self.width.clone().into()),
            (GpxParameter::ShowArrows, self.show_arrows.into()),
            (GpxParameter::ShowStartFinish, self.show_start_finish.into()),
            (GpxParameter::SplitType, self.split_type.into()),
            (GpxParameter::SplitInterval, self.split_interval.into()),
            (GpxParameter::ColoringType, self.coloring_type.clone().into()),
        ]
    }
}

struct HelperInner {
    store: Arc<dyn ItemStore>,
    tracks: TracksConfig,
    cache: DashMap<PathBuf, GpxDataItem>,
    reader: GpxReader,
}

/// Shared handle to the track metadata cache
#[derive(Clone)]
pub struct GpxDbHelper {
    inner: Arc<HelperInner>,
}

impl GpxDbHelper {
    /// Helper that analyses with [`GpxAnalyzer`] and skips city lookups
    pub fn new(store: Arc<dyn ItemStore>, tracks: TracksConfig) -> Self {
        Self::with_collaborators(store, Arc::new(GpxAnalyzer), None, tracks)
    }

    pub fn with_collaborators(
        store: Arc<dyn ItemStore>,
        analyzer: Arc<dyn TrackAnalyzer>,
        city_resolver: Option<Arc<dyn CityResolver>>,
        tracks: TracksConfig,
    ) -> Self {
        let city_resolver =
            city_resolver.unwrap_or_else(|| Arc::new(NoCityResolver) as Arc<dyn CityResolver>);
        let inner = Arc::new_cyclic(|weak: &Weak<HelperInner>| {
            let listener: Weak<dyn ReadListener> = weak.clone();
            HelperInner {
                store,
                tracks,
                cache: DashMap::new(),
                reader: GpxReader::new(analyzer, city_resolver, listener),
            }
        });
        Self { inner }
    }

    #[must_use]
    pub fn tracks_config(&self) -> &TracksConfig {
        &self.inner.tracks
    }

    // ---- Reads ----

    /// Cached record of `file`, queueing a background read when the record is
    /// missing, stale or lacks a city lookup. Never blocks on the read.
    #[must_use]
    pub fn get_item(&self, file: &Path) -> Option<GpxDataItem> {
        self.lookup(file, None)
    }

    /// Like [`get_item`](Self::get_item); `callback` receives the record once
    /// the queued read completes. No read is queued, and the callback is
    /// dropped, when the cached record is current.
    pub fn get_item_with_callback(
        &self,
        file: &Path,
        callback: impl GpxDataItemCallback + 'static,
    ) -> Option<GpxDataItem> {
        self.lookup(file, Some(Box::new(callback)))
    }

    fn lookup(
        &self,
        file: &Path,
        callback: Option<Box<dyn GpxDataItemCallback>>,
    ) -> Option<GpxDataItem> {
        let cached = self.inner.cache.get(file).map(|e| e.value().clone());
        let needs_read = is_analysis_needed(file, cached.as_ref())
            || (file.is_file() && is_city_search_needed(cached.as_ref()));
        if needs_read {
            self.inner.reader.enqueue(file, cached.clone(), callback);
        }
        cached
    }

    #[must_use]
    pub fn has_item(&self, file: &Path) -> bool {
        self.inner.cache.contains_key(file)
    }

    /// Every stored record
    pub fn items(&self) -> Result<Vec<GpxDataItem>> {
        Ok(self.inner.store.list_all()?)
    }

    /// Stored records that are drawn split into segments
    pub fn split_items(&self) -> Result<Vec<GpxDataItem>> {
        let items = self.items()?;
        Ok(items
            .into_iter()
            .filter(|item| item.value(GpxParameter::SplitType).as_i64().unwrap_or(0) != 0)
            .collect())
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.inner.cache.len()
    }

    // ---- Mutations ----

    /// Insert or replace a record
    pub fn add(&self, item: &GpxDataItem) -> Result<()> {
        self.inner.store.insert(item)?;
        self.inner.cache.insert(item.file().to_path_buf(), item.clone());
        debug!("Added record {}", item.file().display());
        Ok(())
    }

    /// Returns false if no record was stored for `file`
    pub fn remove(&self, file: &Path) -> Result<bool> {
        let existed = self.inner.store.remove(file)?;
        self.inner.cache.remove(file);
        Ok(existed)
    }

    /// Move the record of `old` to `new`, keeping its data
    pub fn rename(&self, old: &Path, new: &Path) -> Result<GpxDataItem> {
        if !self.inner.store.rename_key(old, new)? {
            return Err(Error::ItemNotFound(old.to_path_buf()));
        }
        let renamed = match self.inner.cache.remove(old) {
            Some((_, item)) => item.renamed(new),
            None => self
                .inner
                .store
                .get(new)?
                .unwrap_or_else(|| GpxDataItem::new(new)),
        };
        self.inner.cache.insert(new.to_path_buf(), renamed.clone());
        info!("Renamed record {} -> {}", old.display(), new.display());
        Ok(renamed)
    }

    pub fn update_parameter(
        &self,
        item: &GpxDataItem,
        parameter: GpxParameter,
        value: impl Into<ParamValue>,
    ) -> Result<GpxDataItem> {
        self.update_parameters(item, [(parameter, value.into())])
    }

    /// Write several values at once. Every value is validated before the
    /// store is touched.
    pub fn update_parameters(
        &self,
        item: &GpxDataItem,
        values: impl IntoIterator<Item = (GpxParameter, ParamValue)>,
    ) -> Result<GpxDataItem> {
        let fields = values
            .into_iter()
            .map(|(p, v)| p.coerce(v).map(|v| (p, v)))
            .collect::<Result<Vec<_>>>()?;
        self.write_fields(item, &fields)
    }

    pub fn update_gps_filters(
        &self,
        item: &GpxDataItem,
        filters: GpsFilters,
    ) -> Result<GpxDataItem> {
        self.update_parameters(item, filters.to_parameters())
    }

    pub fn update_appearance(
        &self,
        item: &GpxDataItem,
        appearance: &Appearance,
    ) -> Result<GpxDataItem> {
        self.update_parameters(item, appearance.to_parameters())
    }

    /// Replace the analysis of a stored record, stamping the current file
    /// modification time. `None` clears it.
    pub fn update_analysis(
        &self,
        item: &GpxDataItem,
        analysis: Option<&TrackAnalysis>,
    ) -> Result<GpxDataItem> {
        let file = item.file();
        let last_modified = file_modified_millis(file).unwrap_or(0);
        if !self.inner.store.update_analysis(file, analysis, last_modified)? {
            return Err(Error::ItemNotFound(file.to_path_buf()));
        }
        let updated = match self.inner.cache.get(file).map(|e| e.value().clone()) {
            Some(mut cached) => {
                cached.set_analysis(analysis);
                if analysis.is_some() {
                    cached.set_last_modified(last_modified);
                } else {
                    cached.data_mut().unset(GpxParameter::FileLastModifiedTime);
                }
                cached
            }
            None => self.stored(file)?,
        };
        self.inner.cache.insert(file.to_path_buf(), updated.clone());
        Ok(updated)
    }

    /// Drop the analysis so the next [`get_item`](Self::get_item) re-reads
    /// the file
    pub fn clear_analysis(&self, item: &GpxDataItem) -> Result<()> {
        let file = item.file();
        if !self.inner.store.update_analysis(file, None, 0)? {
            return Err(Error::ItemNotFound(file.to_path_buf()));
        }
        self.inner.cache.remove(file);
        Ok(())
    }

    fn write_fields(
        &self,
        item: &GpxDataItem,
        fields: &[(GpxParameter, ParamValue)],
    ) -> Result<GpxDataItem> {
        let file = item.file();
        let cached = self.inner.cache.get(file).map(|e| e.value().clone());
        if let Some(cached) = &cached
            && fields.iter().all(|(p, v)| cached.value(*p).same_as(v))
        {
            debug!("Record {} already holds the new values", file.display());
            return Ok(cached.clone());
        }

        if !self.inner.store.update_fields(file, fields)? {
            return Err(Error::ItemNotFound(file.to_path_buf()));
        }
        let updated = match cached {
            Some(mut cached) => {
                for (parameter, value) in fields {
                    cached.set(*parameter, value.clone())?;
                }
                cached
            }
            None => self.stored(file)?,
        };
        self.inner.cache.insert(file.to_path_buf(), updated.clone());
        Ok(updated)
    }

    /// Stored record of `file` after a successful write
    fn stored(&self, file: &Path) -> Result<GpxDataItem> {
        self.inner
            .store
            .get(file)?
            .ok_or_else(|| Error::ItemNotFound(file.to_path_buf()))
    }

    // ---- Loading ----

    /// Load every stored record into the cache, purge records of deleted
    /// files and add bare records for untracked files under the tracks
    /// directory.
    pub fn load_gpx_items(&self) -> Result<LoadStats> {
        let mut stats = LoadStats::default();

        for item in self.inner.store.list_all()? {
            if item.file().is_file() {
                self.inner.cache.insert(item.file().to_path_buf(), item);
                stats.loaded += 1;
            } else {
                debug!("Purging record of missing file {}", item.file().display());
                self.inner.store.remove(item.file())?;
                self.inner.cache.remove(item.file());
                stats.purged += 1;
            }
        }

        let tracks = &self.inner.tracks;
        for track in scan_tracks(&tracks.dir, &tracks.extensions, tracks.recursive) {
            if self.inner.cache.contains_key(&track.path) {
                continue;
            }
            self.add(&GpxDataItem::new(&track.path))?;
            stats.added += 1;
        }

        info!(
            "Loaded {} records, purged {}, added {}",
            stats.loaded, stats.purged, stats.added
        );
        Ok(stats)
    }

    // ---- Aggregates ----

    /// Nearest cities with their track counts, most frequent first
    pub fn nearest_city_list(&self) -> Result<Vec<(String, usize)>> {
        Ok(self.inner.store.distinct_values(GpxParameter::NearestCityName)?)
    }

    pub fn track_colors_list(&self) -> Result<Vec<(String, usize)>> {
        Ok(self.inner.store.distinct_values(GpxParameter::Color)?)
    }

    pub fn track_width_list(&self) -> Result<Vec<(String, usize)>> {
        Ok(self.inner.store.distinct_values(GpxParameter::Width)?)
    }

    /// Earliest known creation time (ms), ignoring unknown ones
    #[allow(clippy::cast_possible_truncation)]
    pub fn tracks_min_create_date(&self) -> Result<Option<i64>> {
        let min = self.inner.store.min_value(GpxParameter::FileCreationTime)?;
        Ok(min.map(|v| v as i64))
    }

    /// Longest track duration (ms)
    #[allow(clippy::cast_possible_truncation)]
    pub fn tracks_max_duration(&self) -> Result<Option<i64>> {
        let max = self.inner.store.max_value(GpxParameter::TimeSpan)?;
        Ok(max.map(|v| v as i64))
    }

    /// Folders holding tracks, relative to the tracks directory
    pub fn track_folders(&self) -> Result<Vec<(String, usize)>> {
        let root = &self.inner.tracks.dir;
        let folders = self.inner.store.folders()?;
        Ok(folders
            .into_iter()
            .map(|(folder, count)| {
                let relative = Path::new(&folder)
                    .strip_prefix(root)
                    .map_or(folder.clone(), |p| p.to_string_lossy().into_owned());
                (relative, count)
            })
            .collect())
    }

    // ---- Reader state ----

    /// Whether the background reader is idle
    #[must_use]
    pub fn is_read(&self) -> bool {
        self.inner.reader.state() == ReaderState::Idle
    }

    #[must_use]
    pub fn is_reading(&self, file: &Path) -> bool {
        self.inner.reader.is_reading(file)
    }

    /// File the reader is parsing right now
    #[must_use]
    pub fn current_read(&self) -> Option<PathBuf> {
        self.inner.reader.current()
    }

    #[must_use]
    pub fn pending_reads(&self) -> usize {
        self.inner.reader.pending()
    }

    /// Abandon queued reads. The file in flight still completes.
    pub fn stop_reading(&self) {
        self.inner.reader.cancel();
    }

    /// Block until the reader is idle. Returns false on timeout.
    pub fn wait_until_read(&self, timeout: Duration) -> bool {
        self.inner.reader.wait_idle(timeout)
    }
}

impl HelperInner {
    /// Merge the derived fields of a freshly read record into the stored
    /// one, inserting it if the store has none, and return what was stored.
    fn persist_read(&self, item: &GpxDataItem) -> StoreResult<GpxDataItem> {
        let derived: Vec<(GpxParameter, ParamValue)> = item
            .data()
            .iter()
            .filter(|(p, _)| is_derived(*p))
            .map(|(p, v)| (p, v.clone()))
            .collect();
        if !self.store.update_fields(item.file(), &derived)? {
            self.store.insert(item)?;
        }
        Ok(self
            .store
            .get(item.file())?
            .unwrap_or_else(|| item.clone()))
    }
}

fn is_derived(parameter: GpxParameter) -> bool {
    parameter.kind() == ParameterKind::Analysis
        || matches!(
            parameter,
            GpxParameter::FileLastModifiedTime
                | GpxParameter::FileCreationTime
                | GpxParameter::NearestCityName
        )
}

impl ReadListener for HelperInner {
    fn on_item_read(&self, item: GpxDataItem) -> GpxDataItem {
        if !item.file().is_file() {
            debug!("{} vanished while reading, not stored", item.file().display());
            return item;
        }
        match self.persist_read(&item) {
            Ok(stored) => {
                self.cache.insert(stored.file().to_path_buf(), stored.clone());
                stored
            }
            Err(e) => {
                error!("Failed to store record {}: {}", item.file().display(), e);
                item
            }
        }
    }

    fn on_reading_cancelled(&self, abandoned: usize) {
        if abandoned > 0 {
            warn!("Reading cancelled, {} files left unread", abandoned);
        }
    }
}

impl Drop for HelperInner {
    fn drop(&mut self) {
        self.reader.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpxdb_store::{RedbItemStore, StoreError};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;
    use tempfile::{TempDir, tempdir};

    const TRACK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="52.5200" lon="13.4050"><ele>34.0</ele><time>2024-05-01T10:00:00Z</time></trkpt>
    <trkpt lat="52.5210" lon="13.4060"><ele>36.0</ele><time>2024-05-01T10:01:00Z</time></trkpt>
    <trkpt lat="52.5220" lon="13.4070"><ele>35.0</ele><time>2024-05-01T10:02:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#;

    const WAIT: Duration = Duration::from_secs(10);

    fn setup() -> (TempDir, GpxDbHelper) {
        let dir = tempdir().unwrap();
        let store: Arc<dyn ItemStore> = Arc::new(RedbItemStore::in_memory().unwrap());
        let helper = GpxDbHelper::new(store, TracksConfig::with_dir(dir.path()));
        (dir, helper)
    }

    fn write_track(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, TRACK).unwrap();
        path
    }

    #[test]
    fn test_get_item_reads_in_background() {
        let (dir, helper) = setup();
        let file = write_track(&dir, "ride.gpx");

        assert!(helper.get_item(&file).is_none());
        assert!(helper.wait_until_read(WAIT));

        let item = helper.get_item(&file).unwrap();
        let analysis = item.analysis().unwrap();
        assert_eq!(analysis.points, 3);
        assert!(analysis.total_distance > 0.0);
        assert_eq!(item.nearest_city().as_deref(), Some(""));
        assert!(helper.is_read(), "current record queues nothing");
        assert_eq!(helper.items().unwrap(), vec![item]);
    }

    #[test]
    fn test_callback_receives_record() {
        let (dir, helper) = setup();
        let file = write_track(&dir, "ride.gpx");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        helper.get_item_with_callback(&file, move |item: &GpxDataItem| {
            sink.lock().push(item.clone());
        });
        assert!(helper.wait_until_read(WAIT));

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].analysis().unwrap().points, 3);
    }

    #[test]
    fn test_missing_file_is_never_queued() {
        let (dir, helper) = setup();
        assert!(helper.get_item(&dir.path().join("ghost.gpx")).is_none());
        assert!(helper.is_read());
        assert_eq!(helper.pending_reads(), 0);
    }

    #[test]
    fn test_update_parameter_writes_through() {
        let (dir, helper) = setup();
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();

        let updated = helper
            .update_parameter(&item, GpxParameter::Color, 0xFF00_FF00_i64)
            .unwrap();
        let again = helper
            .update_parameter(&item, GpxParameter::Color, 0xFF00_FF00_i64)
            .unwrap();
        assert_eq!(updated, again);

        let stored = helper.items().unwrap();
        assert_eq!(stored, vec![updated.clone()]);
        assert_eq!(helper.get_item(item.file()), Some(updated));
    }

    #[test]
    fn test_type_mismatch_leaves_store_untouched() {
        let (dir, helper) = setup();
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();

        let err = helper
            .update_parameter(&item, GpxParameter::Color, "red")
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert_eq!(helper.items().unwrap(), vec![item]);
    }

    #[test]
    fn test_update_unknown_record() {
        let (_dir, helper) = setup();
        let err = helper
            .update_parameter(&GpxDataItem::new("nope.gpx"), GpxParameter::SplitType, 1_i64)
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!helper.has_item(Path::new("nope.gpx")));
    }

    #[test]
    fn test_appearance_and_filters() {
        let (dir, helper) = setup();
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();

        let appearance = Appearance {
            color: Some(0xFFFF_0000),
            width: Some("bold".to_string()),
            show_arrows: true,
            split_type: 1,
            split_interval: 1000.0,
            ..Appearance::default()
        };
        let updated = helper.update_appearance(&item, &appearance).unwrap();
        assert_eq!(Appearance::from_item(&updated), appearance);
        assert_eq!(helper.split_items().unwrap().len(), 1);

        let filters = GpsFilters {
            max_speed: 40.0,
            ..GpsFilters::default()
        };
        let updated = helper.update_gps_filters(&item, filters).unwrap();
        let read_back = GpsFilters::from_item(&updated);
        assert!((read_back.max_speed - 40.0).abs() < f64::EPSILON);
        assert!(read_back.min_speed.is_nan());
        assert_eq!(Appearance::from_item(&updated), appearance);
    }

    #[test]
    fn test_rename_carries_data() {
        let (dir, helper) = setup();
        let old = write_track(&dir, "old.gpx");
        let new = dir.path().join("new.gpx");
        let item = GpxDataItem::new(&old);
        helper.add(&item).unwrap();
        helper.update_parameter(&item, GpxParameter::Width, "thin").unwrap();

        let renamed = helper.rename(&old, &new).unwrap();
        assert_eq!(renamed.file(), new);
        assert_eq!(renamed.value(GpxParameter::Width), ParamValue::Text("thin".into()));
        assert!(!helper.has_item(&old));
        assert!(helper.has_item(&new));
        assert!(helper.rename(&old, &new).unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove() {
        let (dir, helper) = setup();
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();
        assert!(helper.remove(item.file()).unwrap());
        assert!(!helper.has_item(item.file()));
        assert!(!helper.remove(item.file()).unwrap());
    }

    #[test]
    fn test_clear_analysis_forces_reread() {
        let (dir, helper) = setup();
        let file = write_track(&dir, "a.gpx");
        let _ = helper.get_item(&file);
        assert!(helper.wait_until_read(WAIT));
        let item = helper.get_item(&file).unwrap();

        helper.clear_analysis(&item).unwrap();
        assert!(!helper.has_item(&file));
        assert!(helper.items().unwrap()[0].analysis().is_none());

        let _ = helper.get_item(&file);
        assert!(helper.wait_until_read(WAIT));
        assert!(helper.get_item(&file).unwrap().analysis().is_some());
    }

    #[test]
    fn test_load_purges_and_adds() {
        let (dir, helper) = setup();
        let kept = write_track(&dir, "kept.gpx");
        helper.add(&GpxDataItem::new(&kept)).unwrap();
        helper.add(&GpxDataItem::new(dir.path().join("gone.gpx"))).unwrap();
        write_track(&dir, "2024/new.gpx");

        let stats = helper.load_gpx_items().unwrap();
        assert_eq!(
            stats,
            LoadStats {
                loaded: 1,
                purged: 1,
                added: 1
            }
        );
        assert_eq!(helper.cached_len(), 2);
        assert_eq!(helper.items().unwrap().len(), 2);
        assert_eq!(
            helper.track_folders().unwrap().into_iter().collect::<BTreeMap<_, _>>(),
            BTreeMap::from([(String::new(), 1), ("2024".to_string(), 1)])
        );
    }

    #[test]
    fn test_aggregates() {
        let (dir, helper) = setup();
        let records = [("a.gpx", "Berlin", 300_i64), ("b.gpx", "Berlin", 100), ("c.gpx", "Bonn", 0)];
        for (name, city, created) in records {
            let mut item = GpxDataItem::new(write_track(&dir, name));
            item.set(GpxParameter::NearestCityName, city).unwrap();
            item.set(GpxParameter::FileCreationTime, created).unwrap();
            helper.add(&item).unwrap();
        }
        assert_eq!(
            helper.nearest_city_list().unwrap(),
            vec![("Berlin".to_string(), 2), ("Bonn".to_string(), 1)]
        );
        assert_eq!(helper.tracks_min_create_date().unwrap(), Some(100));
        assert_eq!(helper.tracks_max_duration().unwrap(), None);
    }

    /// Store whose writes can be switched off
    struct FlakyStore {
        inner: RedbItemStore,
        failing: Mutex<bool>,
    }

    impl FlakyStore {
        fn check(&self) -> StoreResult<()> {
            if *self.failing.lock() {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }
    }

    impl ItemStore for FlakyStore {
        fn list_all(&self) -> StoreResult<Vec<GpxDataItem>> {
            self.inner.list_all()
        }

        fn get(&self, file: &Path) -> StoreResult<Option<GpxDataItem>> {
            self.inner.get(file)
        }

        fn insert(&self, item: &GpxDataItem) -> StoreResult<()> {
            self.check()?;
            self.inner.insert(item)
        }

        fn update_fields(
            &self,
            file: &Path,
            fields: &[(GpxParameter, ParamValue)],
        ) -> StoreResult<bool> {
            self.check()?;
            self.inner.update_fields(file, fields)
        }

        fn update_analysis(
            &self,
            file: &Path,
            analysis: Option<&TrackAnalysis>,
            last_modified: i64,
        ) -> StoreResult<bool> {
            self.check()?;
            self.inner.update_analysis(file, analysis, last_modified)
        }

        fn remove(&self, file: &Path) -> StoreResult<bool> {
            self.check()?;
            self.inner.remove(file)
        }

        fn rename_key(&self, old: &Path, new: &Path) -> StoreResult<bool> {
            self.check()?;
            self.inner.rename_key(old, new)
        }
    }

    #[test]
    fn test_store_failure_leaves_cache_untouched() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FlakyStore {
            inner: RedbItemStore::in_memory().unwrap(),
            failing: Mutex::new(false),
        });
        let helper = GpxDbHelper::new(store.clone(), TracksConfig::with_dir(dir.path()));
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();

        *store.failing.lock() = true;
        let err = helper
            .update_parameter(&item, GpxParameter::Width, "bold")
            .unwrap_err();
        assert!(err.is_storage());
        assert!(helper.remove(item.file()).is_err());
        let cached = helper.get_item(item.file()).unwrap();
        assert_eq!(cached.value(GpxParameter::Width), ParamValue::Null);

        // The reader still hands the record to callbacks
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        helper.get_item_with_callback(item.file(), move |read: &GpxDataItem| {
            *sink.lock() = Some(read.clone());
        });
        assert!(helper.wait_until_read(WAIT));
        assert_eq!(seen.lock().as_ref().unwrap().analysis().unwrap().points, 3);
        assert!(helper.get_item(item.file()).unwrap().analysis().is_none());
    }

    #[test]
    fn test_unchanged_values_skip_the_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FlakyStore {
            inner: RedbItemStore::in_memory().unwrap(),
            failing: Mutex::new(false),
        });
        let helper = GpxDbHelper::new(store.clone(), TracksConfig::with_dir(dir.path()));
        let item = GpxDataItem::new(write_track(&dir, "a.gpx"));
        helper.add(&item).unwrap();
        let filters = GpsFilters {
            max_speed: 30.0,
            ..GpsFilters::default()
        };
        let updated = helper.update_gps_filters(&item, filters).unwrap();

        *store.failing.lock() = true;
        assert_eq!(helper.update_gps_filters(&item, filters).unwrap(), updated);
        assert!(helper.update_gps_filters(&item, GpsFilters::default()).is_err());
    }
}
