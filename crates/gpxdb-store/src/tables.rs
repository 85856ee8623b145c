//! Redb table definitions for persistent track metadata.

use redb::TableDefinition;

// Key: track file path, Value: bincode-encoded StoredItem
pub const GPX_ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("gpx_items");
