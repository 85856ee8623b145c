//! Persistent track metadata store.
//!
//! [`ItemStore`] is the interface the cache facade writes through to.
//! [`RedbItemStore`] implements it on redb: every mutation is one write
//! transaction + commit, so a failed call leaves the stored row untouched.
//! Reads of individual records go through the in-memory cache in the facade;
//! this module only handles persistence.

use crate::query;
use crate::tables;
use crate::types::StoredItem;
use gpxdb_common::{GpxDataItem, GpxParameter, ParamValue, TrackAnalysis};
use redb::{Database, ReadableTable, ReadableTableMetadata};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Error type for metadata store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("path is not valid UTF-8: {}", .0.display())]
    InvalidKey(PathBuf),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl From<StoreError> for gpxdb_common::Error {
    fn from(e: StoreError) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable per-file metadata records, keyed by file path.
pub trait ItemStore: Send + Sync {
    /// Every stored record
    fn list_all(&self) -> StoreResult<Vec<GpxDataItem>>;

    fn get(&self, file: &Path) -> StoreResult<Option<GpxDataItem>>;

    /// Insert or replace the record of `item.file()`
    fn insert(&self, item: &GpxDataItem) -> StoreResult<()>;

    /// Merge `fields` into an existing record. Returns false if there is none.
    fn update_fields(
        &self,
        file: &Path,
        fields: &[(GpxParameter, ParamValue)],
    ) -> StoreResult<bool>;

    /// Replace the analysis of an existing record, or clear it on `None`.
    /// Returns false if there is no record.
    fn update_analysis(
        &self,
        file: &Path,
        analysis: Option<&TrackAnalysis>,
        last_modified: i64,
    ) -> StoreResult<bool>;

    /// Returns false if there was no record
    fn remove(&self, file: &Path) -> StoreResult<bool>;

    /// Move the record of `old` to `new`. Returns false if `old` has no record.
    fn rename_key(&self, old: &Path, new: &Path) -> StoreResult<bool>;

    fn distinct_values(&self, parameter: GpxParameter) -> StoreResult<Vec<(String, usize)>> {
        Ok(query::distinct_values(&self.list_all()?, parameter))
    }

    fn min_value(&self, parameter: GpxParameter) -> StoreResult<Option<f64>> {
        Ok(query::min_value(&self.list_all()?, parameter))
    }

    fn max_value(&self, parameter: GpxParameter) -> StoreResult<Option<f64>> {
        Ok(query::max_value(&self.list_all()?, parameter))
    }

    fn folders(&self) -> StoreResult<Vec<(String, usize)>> {
        Ok(query::folders(&self.list_all()?))
    }
}

/// Persistent metadata store backed by redb.
pub struct RedbItemStore {
    db: Database,
}

impl RedbItemStore {
    /// Open (or create) the redb database at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::init(Database::create(path)?)?;
        info!("Opened track store at {}", path.display());
        Ok(store)
    }

    /// Non-persistent store, for tests and dry runs
    pub fn in_memory() -> StoreResult<Self> {
        let db = redb::Builder::new().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StoreResult<Self> {
        // Create tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::GPX_ITEMS)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Number of stored records
    pub fn len(&self) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::GPX_ITEMS)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Read-modify-write of one record inside a single write transaction
    fn modify(&self, file: &Path, f: impl FnOnce(&mut StoredItem)) -> StoreResult<bool> {
        let key = key_of(file)?;
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut table = write_txn.open_table(tables::GPX_ITEMS)?;
            // Copy out, then drop the guard before mutating
            let current = table.get(key)?.map(|v| v.value().to_vec());
            match current {
                Some(bytes) => {
                    let mut stored: StoredItem = bincode::deserialize(&bytes)?;
                    f(&mut stored);
                    let bytes = bincode::serialize(&stored)?;
                    table.insert(key, bytes.as_slice())?;
                    true
                }
                None => false,
            }
        };
        if updated {
            write_txn.commit()?;
        }
        Ok(updated)
    }
}

impl ItemStore for RedbItemStore {
    fn list_all(&self) -> StoreResult<Vec<GpxDataItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::GPX_ITEMS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let entry = entry?;
            let key = entry.0.value().to_string();
            match bincode::deserialize::<StoredItem>(entry.1.value()) {
                Ok(stored) => result.push(stored.to_item(Path::new(&key))),
                Err(e) => error!("Failed to decode record '{}': {}", key, e),
            }
        }
        Ok(result)
    }

    fn get(&self, file: &Path) -> StoreResult<Option<GpxDataItem>> {
        let key = key_of(file)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(tables::GPX_ITEMS)?;
        match table.get(key)? {
            Some(val) => {
                let stored: StoredItem = bincode::deserialize(val.value())?;
                Ok(Some(stored.to_item(file)))
            }
            None => Ok(None),
        }
    }

    fn insert(&self, item: &GpxDataItem) -> StoreResult<()> {
        let key = key_of(item.file())?;
        let bytes = bincode::serialize(&StoredItem::from_data(item.data()))?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(tables::GPX_ITEMS)?;
            table.insert(key, bytes.as_slice())?;
        }
        write_txn.commit()?;
        debug!("Stored record {}", key);
        Ok(())
    }

    fn update_fields(
        &self,
        file: &Path,
        fields: &[(GpxParameter, ParamValue)],
    ) -> StoreResult<bool> {
        self.modify(file, |stored| {
            for (parameter, value) in fields {
                stored.set(*parameter, value.clone());
            }
        })
    }

    fn update_analysis(
        &self,
        file: &Path,
        analysis: Option<&TrackAnalysis>,
        last_modified: i64,
    ) -> StoreResult<bool> {
        self.modify(file, |stored| {
            let mut data = stored.to_data(file);
            data.set_analysis(analysis);
            if analysis.is_some() {
                data.set_last_modified(last_modified);
            } else {
                data.unset(GpxParameter::FileLastModifiedTime);
            }
            *stored = StoredItem::from_data(&data);
        })
    }

    fn remove(&self, file: &Path) -> StoreResult<bool> {
        let key = key_of(file)?;
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(tables::GPX_ITEMS)?;
            table.remove(key)?.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn rename_key(&self, old: &Path, new: &Path) -> StoreResult<bool> {
        let old_key = key_of(old)?;
        let new_key = key_of(new)?;
        let write_txn = self.db.begin_write()?;
        let moved = {
            let mut table = write_txn.open_table(tables::GPX_ITEMS)?;
            let bytes = table.remove(old_key)?.map(|v| v.value().to_vec());
            match bytes {
                Some(bytes) => {
                    table.insert(new_key, bytes.as_slice())?;
                    true
                }
                None => false,
            }
        };
        if moved {
            write_txn.commit()?;
        }
        Ok(moved)
    }
}

fn key_of(file: &Path) -> StoreResult<&str> {
    file.to_str()
        .ok_or_else(|| StoreError::InvalidKey(file.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn analysed(path: &str) -> GpxDataItem {
        let mut item = GpxDataItem::new(path);
        item.set_analysis(Some(&TrackAnalysis {
            total_distance: 500.0,
            points: 10,
            time_span: 60_000,
            ..TrackAnalysis::default()
        }));
        item.set(GpxParameter::FileLastModifiedTime, 1_000_i64).unwrap();
        item
    }

    #[test]
    fn test_insert_and_get() {
        let store = RedbItemStore::in_memory().unwrap();
        let item = analysed("/tracks/a.gpx");
        store.insert(&item).unwrap();

        assert_eq!(store.get(Path::new("/tracks/a.gpx")).unwrap(), Some(item));
        assert_eq!(store.get(Path::new("/tracks/b.gpx")).unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("gpx.redb");
        let item = analysed("/tracks/a.gpx");
        {
            let store = RedbItemStore::open(&db_path).unwrap();
            store.insert(&item).unwrap();
        }
        let store = RedbItemStore::open(&db_path).unwrap();
        assert_eq!(store.list_all().unwrap(), vec![item]);
    }

    #[test]
    fn test_update_fields_merges() {
        let store = RedbItemStore::in_memory().unwrap();
        store.insert(&analysed("a.gpx")).unwrap();

        let updated = store
            .update_fields(
                Path::new("a.gpx"),
                &[
                    (GpxParameter::Color, ParamValue::Integer(0xFFFF_0000)),
                    (GpxParameter::Width, ParamValue::Text("thin".into())),
                ],
            )
            .unwrap();
        assert!(updated);

        let item = store.get(Path::new("a.gpx")).unwrap().unwrap();
        assert_eq!(item.value(GpxParameter::Color), ParamValue::Integer(0xFFFF_0000));
        assert_eq!(item.value(GpxParameter::Width), ParamValue::Text("thin".into()));
        assert_eq!(item.analysis().unwrap().points, 10);
    }

    #[test]
    fn test_update_missing_record() {
        let store = RedbItemStore::in_memory().unwrap();
        let updated = store
            .update_fields(Path::new("nope.gpx"), &[(GpxParameter::SplitType, 1.into())])
            .unwrap();
        assert!(!updated);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_update_and_clear_analysis() {
        let store = RedbItemStore::in_memory().unwrap();
        store.insert(&GpxDataItem::new("a.gpx")).unwrap();

        let analysis = TrackAnalysis {
            points: 3,
            ..TrackAnalysis::default()
        };
        assert!(store.update_analysis(Path::new("a.gpx"), Some(&analysis), 42).unwrap());
        let item = store.get(Path::new("a.gpx")).unwrap().unwrap();
        assert_eq!(item.analysis(), Some(analysis));
        assert_eq!(item.last_modified(), 42);

        assert!(store.update_analysis(Path::new("a.gpx"), None, 0).unwrap());
        let item = store.get(Path::new("a.gpx")).unwrap().unwrap();
        assert!(item.analysis().is_none());
        assert_eq!(item.last_modified(), 0);
    }

    #[test]
    fn test_remove() {
        let store = RedbItemStore::in_memory().unwrap();
        store.insert(&GpxDataItem::new("a.gpx")).unwrap();
        assert!(store.remove(Path::new("a.gpx")).unwrap());
        assert!(!store.remove(Path::new("a.gpx")).unwrap());
    }

    #[test]
    fn test_rename_moves_record() {
        let store = RedbItemStore::in_memory().unwrap();
        let item = analysed("old.gpx");
        store.insert(&item).unwrap();

        assert!(store.rename_key(Path::new("old.gpx"), Path::new("new.gpx")).unwrap());
        assert_eq!(store.get(Path::new("old.gpx")).unwrap(), None);
        assert_eq!(
            store.get(Path::new("new.gpx")).unwrap(),
            Some(item.renamed("new.gpx"))
        );
        assert!(!store.rename_key(Path::new("old.gpx"), Path::new("x.gpx")).unwrap());
    }

    #[test]
    fn test_aggregates() {
        let store = RedbItemStore::in_memory().unwrap();
        for (path, color) in [("a/1.gpx", 1), ("a/2.gpx", 2), ("b/3.gpx", 1)] {
            let mut item = analysed(path);
            item.set(GpxParameter::Color, i64::from(color)).unwrap();
            store.insert(&item).unwrap();
        }
        assert_eq!(
            store.distinct_values(GpxParameter::Color).unwrap(),
            vec![("1".to_string(), 2), ("2".to_string(), 1)]
        );
        assert_eq!(store.max_value(GpxParameter::TimeSpan).unwrap(), Some(60_000.0));
        assert_eq!(
            store.folders().unwrap(),
            vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
    }
}
