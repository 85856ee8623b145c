//! Table and JSON rendering

use chrono::DateTime;
use gpxdb_cache::{LoadStats, MetricSystem};
use gpxdb_common::{GpxDataItem, ParamValue};
use serde_json::{Map, Value, json};

pub struct Stats {
    pub cities: Vec<(String, usize)>,
    pub colors: Vec<(String, usize)>,
    pub widths: Vec<(String, usize)>,
    pub folders: Vec<(String, usize)>,
    pub min_create_date: Option<i64>,
    pub max_duration: Option<i64>,
    pub split_tracks: usize,
}

fn value_json(value: &ParamValue) -> Value {
    match value {
        ParamValue::Null => Value::Null,
        ParamValue::Integer(v) => json!(v),
        // NaN and infinities have no JSON form and map to null
        ParamValue::Double(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        ParamValue::Text(v) => json!(v),
        ParamValue::Boolean(v) => json!(v),
    }
}

/// Record as a flat JSON object keyed by column name
pub fn item_json(item: &GpxDataItem) -> Value {
    let mut fields = Map::new();
    fields.insert("file".to_string(), json!(item.file().to_string_lossy()));
    for (parameter, value) in item.data().iter() {
        fields.insert(parameter.column_name().to_string(), value_json(value));
    }
    Value::Object(fields)
}

fn counts_json(counts: &[(String, usize)]) -> Value {
    Value::Array(
        counts
            .iter()
            .map(|(value, count)| json!({ "value": value, "count": count }))
            .collect(),
    )
}

fn format_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string())
}

fn format_duration(millis: i64) -> String {
    let secs = millis / 1000;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

pub fn print_item(item: &GpxDataItem, json: bool) {
    if json {
        println!("{}", item_json(item));
        return;
    }
    println!("{}", item.file().display());
    for (parameter, value) in item.data().iter() {
        println!("  {:<24} {}", parameter.column_name(), value);
    }
}

pub fn print_items(items: &[GpxDataItem], metric: MetricSystem, json: bool) {
    if json {
        let list: Vec<Value> = items.iter().map(item_json).collect();
        println!("{}", Value::Array(list));
        return;
    }

    println!(
        "{:<48} {:>10} {:>10} {:>10}  {}",
        "FILE",
        metric.distance_unit(),
        "DURATION",
        metric.speed_unit(),
        "CITY"
    );
    for item in items {
        let file = item.file().display().to_string();
        match item.analysis() {
            Some(a) => println!(
                "{:<48} {:>10.2} {:>10} {:>10.1}  {}",
                file,
                a.total_distance / metric.meters_per_unit(),
                format_duration(a.time_span),
                a.max_speed * metric.speed_factor(),
                item.nearest_city().unwrap_or_default()
            ),
            None => println!("{file:<48} {:>10} {:>10} {:>10}", "-", "-", "-"),
        }
    }
    println!("{} tracks", items.len());
}

pub fn print_scan(stats: &LoadStats, queued: usize, analysed: usize, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "loaded": stats.loaded,
                "purged": stats.purged,
                "added": stats.added,
                "queued": queued,
                "analysed": analysed,
            })
        );
        return;
    }
    println!("Loaded:   {}", stats.loaded);
    println!("Purged:   {}", stats.purged);
    println!("Added:    {}", stats.added);
    println!("Queued:   {queued}");
    println!("Analysed: {analysed}");
}

pub fn print_stats(stats: &Stats, json: bool) {
    if json {
        println!(
            "{}",
            json!({
                "cities": counts_json(&stats.cities),
                "colors": counts_json(&stats.colors),
                "widths": counts_json(&stats.widths),
                "folders": counts_json(&stats.folders),
                "minCreateDate": stats.min_create_date,
                "maxDuration": stats.max_duration,
                "splitTracks": stats.split_tracks,
            })
        );
        return;
    }

    for (title, counts) in [
        ("Cities", &stats.cities),
        ("Colors", &stats.colors),
        ("Widths", &stats.widths),
        ("Folders", &stats.folders),
    ] {
        println!("{title}");
        for (value, count) in counts {
            let value = if value.is_empty() { "." } else { value.as_str() };
            println!("  {value:<32} {count}");
        }
    }
    if let Some(created) = stats.min_create_date {
        println!("Oldest track:  {}", format_millis(created));
    }
    if let Some(duration) = stats.max_duration {
        println!("Longest track: {}", format_duration(duration));
    }
    println!("Split tracks:  {}", stats.split_tracks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpxdb_common::GpxParameter;

    #[test]
    fn test_item_json_uses_column_names() {
        let mut item = GpxDataItem::new("/tracks/a.gpx");
        item.set(GpxParameter::Color, 0xFFFF_0000_i64).unwrap();
        item.set(GpxParameter::MaxFilterSpeed, f64::NAN).unwrap();

        let value = item_json(&item);
        assert_eq!(value["file"], "/tracks/a.gpx");
        assert_eq!(value[GpxParameter::Color.column_name()], 0xFFFF_0000_i64);
        assert_eq!(value[GpxParameter::MaxFilterSpeed.column_name()], Value::Null);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3_723_000), "1:02:03");
        assert_eq!(format_millis(0), "1970-01-01 00:00");
    }
}
