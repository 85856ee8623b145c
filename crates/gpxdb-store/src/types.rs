//! Stored types for metadata persistence.
//!
//! Records are serialized to redb via bincode. Parameters are keyed by
//! their column name rather than by enum position, so columns can be added
//! without rewriting existing rows.

use gpxdb_common::{GpxData, GpxDataItem, GpxParameter, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// One persisted record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredItem {
    pub values: BTreeMap<String, ParamValue>,
}

impl StoredItem {
    #[must_use]
    pub fn from_data(data: &GpxData) -> Self {
        Self {
            values: data
                .iter()
                .map(|(p, v)| (p.column_name().to_string(), v.clone()))
                .collect(),
        }
    }

    /// Decode back into parameter values, skipping unknown or mistyped columns
    #[must_use]
    pub fn to_data(&self, file: &Path) -> GpxData {
        let mut data = GpxData::new();
        for (column, value) in &self.values {
            let Some(parameter) = GpxParameter::from_column_name(column) else {
                warn!("Ignoring unknown column '{}' for {}", column, file.display());
                continue;
            };
            if let Err(e) = data.set(parameter, value.clone()) {
                warn!("Ignoring column '{}' for {}: {}", column, file.display(), e);
            }
        }
        data
    }

    #[must_use]
    pub fn to_item(&self, file: &Path) -> GpxDataItem {
        GpxDataItem::with_data(file, self.to_data(file))
    }

    pub fn set(&mut self, parameter: GpxParameter, value: ParamValue) {
        self.values.insert(parameter.column_name().to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_columns_are_dropped() {
        let mut stored = StoredItem::default();
        stored.set(GpxParameter::Color, ParamValue::Integer(7));
        stored
            .values
            .insert("legacyColumn".to_string(), ParamValue::Boolean(true));
        stored
            .values
            .insert("splitType".to_string(), ParamValue::Text("oops".into()));

        let item = stored.to_item(Path::new("a.gpx"));
        assert_eq!(item.value(GpxParameter::Color), ParamValue::Integer(7));
        assert_eq!(item.data().len(), 1);
    }

    #[test]
    fn test_from_data_uses_column_names() {
        let mut data = GpxData::new();
        data.set(GpxParameter::Width, "bold").unwrap();
        let stored = StoredItem::from_data(&data);
        assert_eq!(
            stored.values.get("width"),
            Some(&ParamValue::Text("bold".into()))
        );
    }
}
