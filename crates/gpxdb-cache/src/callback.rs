//! Completion callbacks for background reads.

use gpxdb_common::GpxDataItem;

/// Receives the record produced by a background read.
///
/// Invoked on the reader thread, at most once per registration.
pub trait GpxDataItemCallback: Send + Sync {
    /// A cancelled callback is dropped without being invoked and halts the
    /// reader.
    fn is_cancelled(&self) -> bool {
        false
    }

    fn on_item_ready(&self, item: &GpxDataItem);
}

impl<F> GpxDataItemCallback for F
where
    F: Fn(&GpxDataItem) + Send + Sync,
{
    fn on_item_ready(&self, item: &GpxDataItem) {
        self(item);
    }
}
