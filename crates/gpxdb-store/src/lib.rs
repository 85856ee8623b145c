//! GPXDB Store - persistent track metadata
//!
//! This crate defines the [`ItemStore`] interface the cache facade writes
//! through to, and its redb implementation.

pub mod query;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use store::{ItemStore, RedbItemStore, StoreError, StoreResult};
pub use types::StoredItem;
