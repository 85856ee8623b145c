//! Background GPX reader
//!
//! A single worker thread drains a FIFO queue of files, one file at a time:
//!
//! ```text
//!   Idle --enqueue--> Running --queue drained / cancelled--> Idle
//! ```
//!
//! Enqueue while Idle spawns the worker; enqueue while Running only appends.
//! The worker flips back to Idle under the queue lock, so an enqueue racing
//! the final drain is either picked up by the running worker or starts a new
//! one. Cancelling empties the queue at once; the file in flight still
//! completes, and anything queued afterwards is read normally.
//!
//! Callbacks travel with their queue entry, so cancelling the queue drops
//! them without invocation.

use crate::callback::GpxDataItemCallback;
use crate::city::CityResolver;
use crate::scan::file_modified_millis;
use gpxdb_common::{GpxDataItem, TrackAnalysis};
use gpxdb_gpx::TrackAnalyzer;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

type BoxedCallback = Box<dyn GpxDataItemCallback>;

/// Receives records produced by the worker.
pub trait ReadListener: Send + Sync {
    /// Persist a freshly read record. Returns the record callbacks should
    /// see, which may merge in data the listener already had.
    fn on_item_read(&self, item: GpxDataItem) -> GpxDataItem;

    /// The queue was cleared; `abandoned` entries will never be read.
    fn on_reading_cancelled(&self, _abandoned: usize) {}
}

/// Worker lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Running,
}

/// Whether `file` must be (re)analysed given its cached record.
///
/// Files that do not exist are never analysed.
#[must_use]
pub fn is_analysis_needed(file: &Path, item: Option<&GpxDataItem>) -> bool {
    let Some(modified) = file_modified_millis(file) else {
        return false;
    };
    match item {
        None => true,
        Some(item) => item.analysis().is_none() || modified > item.last_modified(),
    }
}

/// Whether the record has a start location but no nearest-city lookup yet
#[must_use]
pub fn is_city_search_needed(item: Option<&GpxDataItem>) -> bool {
    item.is_some_and(|item| {
        item.nearest_city().is_none()
            && item
                .analysis()
                .is_some_and(|a| a.start_location.is_some())
    })
}

struct PendingRead {
    file: PathBuf,
    snapshot: Option<GpxDataItem>,
    callbacks: Vec<BoxedCallback>,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PendingRead>,
    queued: HashSet<PathBuf>,
    /// File the worker is parsing, with the callbacks waiting on it
    current: Option<PathBuf>,
    current_callbacks: Vec<BoxedCallback>,
    running: bool,
}

impl QueueState {
    /// Detach every queued entry. Callers drop them outside the lock.
    fn take_queue(&mut self) -> VecDeque<PendingRead> {
        self.queued.clear();
        std::mem::take(&mut self.queue)
    }
}

struct Shared {
    state: Mutex<QueueState>,
    idle: Condvar,
    analyzer: Arc<dyn TrackAnalyzer>,
    city_resolver: Arc<dyn CityResolver>,
    listener: Weak<dyn ReadListener>,
}

/// Single-worker background reader
pub struct GpxReader {
    shared: Arc<Shared>,
}

impl GpxReader {
    pub fn new(
        analyzer: Arc<dyn TrackAnalyzer>,
        city_resolver: Arc<dyn CityResolver>,
        listener: Weak<dyn ReadListener>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                idle: Condvar::new(),
                analyzer,
                city_resolver,
                listener,
            }),
        }
    }

    /// Queue `file` for reading.
    ///
    /// Returns false when the file is already queued or being read; the
    /// callback, if any, is then attached to that pending read.
    pub fn enqueue(
        &self,
        file: &Path,
        snapshot: Option<GpxDataItem>,
        callback: Option<BoxedCallback>,
    ) -> bool {
        let mut st = self.shared.state.lock();

        if st.current.as_deref() == Some(file) {
            st.current_callbacks.extend(callback);
            return false;
        }
        if st.queued.contains(file) {
            if let Some(entry) = st.queue.iter_mut().find(|p| p.file == file) {
                entry.callbacks.extend(callback);
            }
            return false;
        }

        st.queued.insert(file.to_path_buf());
        st.queue.push_back(PendingRead {
            file: file.to_path_buf(),
            snapshot,
            callbacks: callback.into_iter().collect(),
        });
        debug!("Queued {} for reading ({} pending)", file.display(), st.queue.len());

        if !st.running {
            self.start_worker(&mut st);
        }
        true
    }

    fn start_worker(&self, st: &mut QueueState) {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("gpx-reader".to_string())
            .spawn(move || run_worker(&shared));
        match spawned {
            Ok(_) => st.running = true,
            // Entries stay queued; the next enqueue retries the spawn
            Err(e) => error!("Failed to start GPX reader thread: {}", e),
        }
    }

    /// Abandon every queued file. The file in flight still completes and
    /// files queued after this call are read as usual.
    pub fn cancel(&self) {
        cancel_queue(&self.shared);
    }

    #[must_use]
    pub fn state(&self) -> ReaderState {
        if self.shared.state.lock().running {
            ReaderState::Running
        } else {
            ReaderState::Idle
        }
    }

    /// Whether `file` is queued or being parsed
    #[must_use]
    pub fn is_reading(&self, file: &Path) -> bool {
        let st = self.shared.state.lock();
        st.current.as_deref() == Some(file) || st.queued.contains(file)
    }

    /// File currently being parsed
    #[must_use]
    pub fn current(&self) -> Option<PathBuf> {
        self.shared.state.lock().current.clone()
    }

    /// Number of queued files, excluding the one in flight
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Block until the worker is idle. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut st = self.shared.state.lock();
        while st.running {
            if self.shared.idle.wait_until(&mut st, deadline).timed_out() {
                return !st.running;
            }
        }
        true
    }
}

fn cancel_queue(shared: &Shared) {
    let abandoned = shared.state.lock().take_queue();
    if abandoned.is_empty() {
        return;
    }
    info!("GPX reader cancelled, {} files abandoned", abandoned.len());
    let count = abandoned.len();
    drop(abandoned);
    if let Some(listener) = shared.listener.upgrade() {
        listener.on_reading_cancelled(count);
    }
}

fn run_worker(shared: &Shared) {
    info!("GPX reader started");
    let mut processed = 0usize;

    loop {
        let next = {
            let mut st = shared.state.lock();
            match st.queue.pop_front() {
                Some(pending) => {
                    st.queued.remove(&pending.file);
                    st.current = Some(pending.file.clone());
                    st.current_callbacks = pending.callbacks;
                    Some((pending.file, pending.snapshot))
                }
                None => {
                    st.running = false;
                    shared.idle.notify_all();
                    None
                }
            }
        };

        let Some((file, snapshot)) = next else {
            info!("GPX reader finished, {} files read", processed);
            return;
        };

        let Some(listener) = shared.listener.upgrade() else {
            // Owner dropped; nobody is left to publish to
            let (abandoned, callbacks) = {
                let mut st = shared.state.lock();
                st.current = None;
                st.running = false;
                shared.idle.notify_all();
                (st.take_queue(), std::mem::take(&mut st.current_callbacks))
            };
            drop((abandoned, callbacks));
            return;
        };

        let item = read_item(shared, &file, snapshot);
        let item = listener.on_item_read(item);
        processed += 1;

        let callbacks = {
            let mut st = shared.state.lock();
            st.current = None;
            std::mem::take(&mut st.current_callbacks)
        };
        for callback in callbacks {
            if callback.is_cancelled() {
                debug!("Callback for {} cancelled, stopping reader", file.display());
                cancel_queue(shared);
            } else {
                callback.on_item_ready(&item);
            }
        }
    }
}

/// Produce the derived record for `file`, starting from its cached snapshot.
fn read_item(shared: &Shared, file: &Path, snapshot: Option<GpxDataItem>) -> GpxDataItem {
    let analysis_needed = is_analysis_needed(file, snapshot.as_ref());
    let mut item = snapshot.unwrap_or_else(|| GpxDataItem::new(file));

    if analysis_needed {
        let last_modified = file_modified_millis(file).unwrap_or(0);
        match shared.analyzer.analyze(file) {
            Ok(summary) => {
                item.set_analysis(Some(&summary.analysis));
                if item.creation_time() <= 0 {
                    let created = summary
                        .creation_time
                        .unwrap_or(summary.analysis.start_time);
                    item.set_creation_time(created);
                }
            }
            Err(e) => {
                warn!("Failed to read {}: {}", file.display(), e);
                item.set_analysis(Some(&TrackAnalysis::default()));
            }
        }
        item.set_last_modified(last_modified);
    }

    if is_city_search_needed(Some(&item))
        && let Some((lat, lon)) = item.analysis().and_then(|a| a.start_location)
    {
        // An empty name records that the search ran and found nothing
        let city = shared
            .city_resolver
            .nearest_city(lat, lon)
            .unwrap_or_default();
        item.set_nearest_city(city);
    }

    item
}
