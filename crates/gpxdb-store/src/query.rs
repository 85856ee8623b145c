//! Read-only aggregate queries over stored records.
//!
//! These back the filter lists of a track browser: which cities, colours,
//! widths and folders occur, and the bounds of date and duration sliders.

use gpxdb_common::{GpxDataItem, GpxParameter, ParamValue};
use std::collections::HashMap;

/// Distinct non-empty values of `parameter` with their record counts,
/// most frequent first, ties ordered by value.
#[must_use]
pub fn distinct_values(items: &[GpxDataItem], parameter: GpxParameter) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        let Some(value) = item.data().get(parameter) else {
            continue;
        };
        let key = match value {
            ParamValue::Null => continue,
            ParamValue::Text(s) if s.is_empty() => continue,
            other => other.to_string(),
        };
        *counts.entry(key).or_default() += 1;
    }
    sort_counts(counts)
}

/// Smallest strictly positive value of a numeric parameter
#[must_use]
pub fn min_value(items: &[GpxDataItem], parameter: GpxParameter) -> Option<f64> {
    numeric_values(items, parameter)
        .filter(|v| *v > 0.0)
        .reduce(f64::min)
}

/// Largest value of a numeric parameter
#[must_use]
pub fn max_value(items: &[GpxDataItem], parameter: GpxParameter) -> Option<f64> {
    numeric_values(items, parameter).reduce(f64::max)
}

/// Parent directories of all records with their record counts
#[must_use]
pub fn folders(items: &[GpxDataItem]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for item in items {
        let folder = item
            .file()
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        *counts.entry(folder).or_default() += 1;
    }
    sort_counts(counts)
}

fn numeric_values(
    items: &[GpxDataItem],
    parameter: GpxParameter,
) -> impl Iterator<Item = f64> + '_ {
    items
        .iter()
        .filter_map(move |item| item.data().get(parameter).and_then(ParamValue::as_f64))
        .filter(|v| !v.is_nan())
}

fn sort_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut result: Vec<(String, usize)> = counts.into_iter().collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, city: Option<&str>, duration: i64) -> GpxDataItem {
        let mut item = GpxDataItem::new(path);
        if let Some(city) = city {
            item.set(GpxParameter::NearestCityName, city).unwrap();
        }
        item.set(GpxParameter::TimeSpan, duration).unwrap();
        item
    }

    #[test]
    fn test_distinct_values_sorted_by_count() {
        let items = vec![
            item("a/1.gpx", Some("Berlin"), 10),
            item("a/2.gpx", Some("Munich"), 20),
            item("b/3.gpx", Some("Berlin"), 0),
            item("b/4.gpx", Some(""), 5),
            item("b/5.gpx", None, 5),
        ];
        assert_eq!(
            distinct_values(&items, GpxParameter::NearestCityName),
            vec![("Berlin".to_string(), 2), ("Munich".to_string(), 1)]
        );
        assert_eq!(max_value(&items, GpxParameter::TimeSpan), Some(20.0));
        assert_eq!(min_value(&items, GpxParameter::TimeSpan), Some(5.0));
        assert_eq!(min_value(&items, GpxParameter::FileCreationTime), None);
        assert_eq!(
            folders(&items),
            vec![("b".to_string(), 3), ("a".to_string(), 2)]
        );
    }
}
