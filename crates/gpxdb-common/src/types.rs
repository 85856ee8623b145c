//! Core type definitions for GPXDB
//!
//! This module defines the record model shared by the store, the reader and
//! the cache facade: the closed set of named parameters a record can hold,
//! their typed values and the record itself.

use crate::analysis::TrackAnalysis;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Category of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// File bookkeeping and user flags
    File,
    /// Derived from parsing the file
    Analysis,
    /// User-configured display settings
    Appearance,
    /// User-configured GPS filter settings
    Filter,
}

/// Storage type of a parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Double,
    Text,
    Boolean,
}

/// Every named field a record can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GpxParameter {
    FileLastModifiedTime,
    FileLastUploadedTime,
    FileCreationTime,
    ApiImported,
    ShowAsMarkers,
    JoinSegments,
    NearestCityName,

    TotalDistance,
    TotalTracks,
    StartTime,
    EndTime,
    TimeSpan,
    TimeMoving,
    TotalDistanceMoving,
    DiffElevationUp,
    DiffElevationDown,
    AvgElevation,
    MinElevation,
    MaxElevation,
    MaxSpeed,
    AvgSpeed,
    Points,
    WptPoints,
    WptCategoryNames,
    StartLat,
    StartLon,

    Color,
    Width,
    ShowArrows,
    ShowStartFinish,
    SplitType,
    SplitInterval,
    ColoringType,

    SmoothingThreshold,
    MinFilterSpeed,
    MaxFilterSpeed,
    MinFilterAltitude,
    MaxFilterAltitude,
    MaxFilterHdop,
}

impl GpxParameter {
    /// All parameters in declaration order
    pub const ALL: [Self; 39] = [
        Self::FileLastModifiedTime,
        Self::FileLastUploadedTime,
        Self::FileCreationTime,
        Self::ApiImported,
        Self::ShowAsMarkers,
        Self::JoinSegments,
        Self::NearestCityName,
        Self::TotalDistance,
        Self::TotalTracks,
        Self::StartTime,
        Self::EndTime,
        Self::TimeSpan,
        Self::TimeMoving,
        Self::TotalDistanceMoving,
        Self::DiffElevationUp,
        Self::DiffElevationDown,
        Self::AvgElevation,
        Self::MinElevation,
        Self::MaxElevation,
        Self::MaxSpeed,
        Self::AvgSpeed,
        Self::Points,
        Self::WptPoints,
        Self::WptCategoryNames,
        Self::StartLat,
        Self::StartLon,
        Self::Color,
        Self::Width,
        Self::ShowArrows,
        Self::ShowStartFinish,
        Self::SplitType,
        Self::SplitInterval,
        Self::ColoringType,
        Self::SmoothingThreshold,
        Self::MinFilterSpeed,
        Self::MaxFilterSpeed,
        Self::MinFilterAltitude,
        Self::MaxFilterAltitude,
        Self::MaxFilterHdop,
    ];

    /// Stable column name used by the persistent store
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::FileLastModifiedTime => "fileLastModifiedTime",
            Self::FileLastUploadedTime => "fileLastUploadedTime",
            Self::FileCreationTime => "fileCreationTime",
            Self::ApiImported => "apiImported",
            Self::ShowAsMarkers => "showAsMarkers",
            Self::JoinSegments => "joinSegments",
            Self::NearestCityName => "nearestCityName",
            Self::TotalDistance => "totalDistance",
            Self::TotalTracks => "totalTracks",
            Self::StartTime => "startTime",
            Self::EndTime => "endTime",
            Self::TimeSpan => "timeSpan",
            Self::TimeMoving => "timeMoving",
            Self::TotalDistanceMoving => "totalDistanceMoving",
            Self::DiffElevationUp => "diffElevationUp",
            Self::DiffElevationDown => "diffElevationDown",
            Self::AvgElevation => "avgElevation",
            Self::MinElevation => "minElevation",
            Self::MaxElevation => "maxElevation",
            Self::MaxSpeed => "maxSpeed",
            Self::AvgSpeed => "avgSpeed",
            Self::Points => "points",
            Self::WptPoints => "wptPoints",
            Self::WptCategoryNames => "wptCategoryNames",
            Self::StartLat => "startLat",
            Self::StartLon => "startLon",
            Self::Color => "color",
            Self::Width => "width",
            Self::ShowArrows => "showArrows",
            Self::ShowStartFinish => "showStartFinish",
            Self::SplitType => "splitType",
            Self::SplitInterval => "splitInterval",
            Self::ColoringType => "coloringType",
            Self::SmoothingThreshold => "smoothingThreshold",
            Self::MinFilterSpeed => "minFilterSpeed",
            Self::MaxFilterSpeed => "maxFilterSpeed",
            Self::MinFilterAltitude => "minFilterAltitude",
            Self::MaxFilterAltitude => "maxFilterAltitude",
            Self::MaxFilterHdop => "maxFilterHdop",
        }
    }

    /// Look a parameter up by its column name
    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.column_name() == name)
    }

    #[must_use]
    pub const fn kind(self) -> ParameterKind {
        match self {
            Self::FileLastModifiedTime
            | Self::FileLastUploadedTime
            | Self::FileCreationTime
            | Self::ApiImported
            | Self::ShowAsMarkers
            | Self::JoinSegments
            | Self::NearestCityName => ParameterKind::File,

            Self::TotalDistance
            | Self::TotalTracks
            | Self::StartTime
            | Self::EndTime
            | Self::TimeSpan
            | Self::TimeMoving
            | Self::TotalDistanceMoving
            | Self::DiffElevationUp
            | Self::DiffElevationDown
            | Self::AvgElevation
            | Self::MinElevation
            | Self::MaxElevation
            | Self::MaxSpeed
            | Self::AvgSpeed
            | Self::Points
            | Self::WptPoints
            | Self::WptCategoryNames
            | Self::StartLat
            | Self::StartLon => ParameterKind::Analysis,

            Self::Color
            | Self::Width
            | Self::ShowArrows
            | Self::ShowStartFinish
            | Self::SplitType
            | Self::SplitInterval
            | Self::ColoringType => ParameterKind::Appearance,

            Self::SmoothingThreshold
            | Self::MinFilterSpeed
            | Self::MaxFilterSpeed
            | Self::MinFilterAltitude
            | Self::MaxFilterAltitude
            | Self::MaxFilterHdop => ParameterKind::Filter,
        }
    }

    #[must_use]
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::FileLastModifiedTime
            | Self::FileLastUploadedTime
            | Self::FileCreationTime
            | Self::TotalTracks
            | Self::StartTime
            | Self::EndTime
            | Self::TimeSpan
            | Self::TimeMoving
            | Self::Points
            | Self::WptPoints
            | Self::Color
            | Self::SplitType => ValueType::Integer,

            Self::ApiImported
            | Self::ShowAsMarkers
            | Self::JoinSegments
            | Self::ShowArrows
            | Self::ShowStartFinish => ValueType::Boolean,

            Self::NearestCityName | Self::WptCategoryNames | Self::Width | Self::ColoringType => {
                ValueType::Text
            }

            Self::TotalDistance
            | Self::TotalDistanceMoving
            | Self::DiffElevationUp
            | Self::DiffElevationDown
            | Self::AvgElevation
            | Self::MinElevation
            | Self::MaxElevation
            | Self::MaxSpeed
            | Self::AvgSpeed
            | Self::StartLat
            | Self::StartLon
            | Self::SplitInterval
            | Self::SmoothingThreshold
            | Self::MinFilterSpeed
            | Self::MaxFilterSpeed
            | Self::MinFilterAltitude
            | Self::MaxFilterAltitude
            | Self::MaxFilterHdop => ValueType::Double,
        }
    }

    /// Whether `ParamValue::Null` is a legal value
    #[must_use]
    pub const fn is_nullable(self) -> bool {
        matches!(
            self,
            Self::NearestCityName
                | Self::WptCategoryNames
                | Self::StartLat
                | Self::StartLon
                | Self::Color
                | Self::Width
                | Self::ColoringType
        )
    }

    /// Value reported when the record does not carry the parameter
    #[must_use]
    pub fn default_value(self) -> ParamValue {
        if self.is_nullable() {
            return ParamValue::Null;
        }
        match self.kind() {
            ParameterKind::Filter => ParamValue::Double(f64::NAN),
            _ => match self.value_type() {
                ValueType::Integer => ParamValue::Integer(0),
                ValueType::Double => ParamValue::Double(0.0),
                ValueType::Text => ParamValue::Text(String::new()),
                ValueType::Boolean => ParamValue::Boolean(false),
            },
        }
    }

    /// Check that `value` can be stored under this parameter
    #[must_use]
    pub const fn accepts(self, value: &ParamValue) -> bool {
        match (self.value_type(), value) {
            (_, ParamValue::Null) => self.is_nullable(),
            (ValueType::Integer, ParamValue::Integer(_))
            | (ValueType::Double, ParamValue::Double(_) | ParamValue::Integer(_))
            | (ValueType::Text, ParamValue::Text(_))
            | (ValueType::Boolean, ParamValue::Boolean(_)) => true,
            _ => false,
        }
    }

    /// Validate and normalize a value for this parameter
    ///
    /// Integers are widened for double parameters.
    pub fn coerce(self, value: ParamValue) -> Result<ParamValue> {
        if !self.accepts(&value) {
            return Err(Error::TypeMismatch {
                parameter: self.column_name().to_string(),
                value: value.to_string(),
            });
        }
        Ok(match (self.value_type(), value) {
            #[allow(clippy::cast_precision_loss)]
            (ValueType::Double, ParamValue::Integer(v)) => ParamValue::Double(v as f64),
            (_, value) => value,
        })
    }
}

impl fmt::Display for GpxParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Typed value of a parameter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    Boolean(bool),
}

impl ParamValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view, widening integers
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Identical values, treating two NaN doubles as equal
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Double(a), Self::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl<T: Into<Self>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Parameter values of one record
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GpxData {
    values: BTreeMap<GpxParameter, ParamValue>,
}

impl GpxData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `parameter`, falling back to its default
    #[must_use]
    pub fn value(&self, parameter: GpxParameter) -> ParamValue {
        self.values
            .get(&parameter)
            .cloned()
            .unwrap_or_else(|| parameter.default_value())
    }

    /// Explicitly stored value, if any
    #[must_use]
    pub fn get(&self, parameter: GpxParameter) -> Option<&ParamValue> {
        self.values.get(&parameter)
    }

    #[must_use]
    pub fn contains(&self, parameter: GpxParameter) -> bool {
        self.values.contains_key(&parameter)
    }

    /// Set a value after type validation
    pub fn set(&mut self, parameter: GpxParameter, value: impl Into<ParamValue>) -> Result<()> {
        let value = parameter.coerce(value.into())?;
        self.values.insert(parameter, value);
        Ok(())
    }

    pub fn unset(&mut self, parameter: GpxParameter) {
        self.values.remove(&parameter);
    }

    /// Stamp the file modification time the analysis was taken at (ms)
    pub fn set_last_modified(&mut self, millis: i64) {
        self.values
            .insert(GpxParameter::FileLastModifiedTime, ParamValue::Integer(millis));
    }

    pub fn set_creation_time(&mut self, millis: i64) {
        self.values
            .insert(GpxParameter::FileCreationTime, ParamValue::Integer(millis));
    }

    /// Record a finished city search; an empty name means nothing was found
    pub fn set_nearest_city(&mut self, city: impl Into<String>) {
        self.values
            .insert(GpxParameter::NearestCityName, ParamValue::Text(city.into()));
    }

    /// Replace all values with the ones of `other`
    pub fn copy_data(&mut self, other: &Self) {
        self.values.clone_from(&other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (GpxParameter, &ParamValue)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Analysis stored in this record, if it has been analysed
    #[must_use]
    pub fn analysis(&self) -> Option<TrackAnalysis> {
        let points = self.get(GpxParameter::Points)?.as_i64()?;
        let int = |p| self.value(p).as_i64().unwrap_or(0);
        let double = |p| self.value(p).as_f64().unwrap_or(0.0);
        let start_location = match (
            self.value(GpxParameter::StartLat).as_f64(),
            self.value(GpxParameter::StartLon).as_f64(),
        ) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        };
        Some(TrackAnalysis {
            total_distance: double(GpxParameter::TotalDistance),
            total_tracks: int(GpxParameter::TotalTracks),
            start_time: int(GpxParameter::StartTime),
            end_time: int(GpxParameter::EndTime),
            time_span: int(GpxParameter::TimeSpan),
            time_moving: int(GpxParameter::TimeMoving),
            total_distance_moving: double(GpxParameter::TotalDistanceMoving),
            diff_elevation_up: double(GpxParameter::DiffElevationUp),
            diff_elevation_down: double(GpxParameter::DiffElevationDown),
            avg_elevation: double(GpxParameter::AvgElevation),
            min_elevation: double(GpxParameter::MinElevation),
            max_elevation: double(GpxParameter::MaxElevation),
            max_speed: double(GpxParameter::MaxSpeed),
            avg_speed: double(GpxParameter::AvgSpeed),
            points,
            wpt_points: int(GpxParameter::WptPoints),
            wpt_category_names: self
                .value(GpxParameter::WptCategoryNames)
                .as_str()
                .map(ToString::to_string),
            start_location,
        })
    }

    /// Write `analysis` into the analysis parameters, or clear them on `None`
    pub fn set_analysis(&mut self, analysis: Option<&TrackAnalysis>) {
        let Some(a) = analysis else {
            self.values.retain(|p, _| p.kind() != ParameterKind::Analysis);
            return;
        };
        let (lat, lon) = match a.start_location {
            Some((lat, lon)) => (ParamValue::Double(lat), ParamValue::Double(lon)),
            None => (ParamValue::Null, ParamValue::Null),
        };
        let entries = [
            (GpxParameter::TotalDistance, ParamValue::Double(a.total_distance)),
            (GpxParameter::TotalTracks, ParamValue::Integer(a.total_tracks)),
            (GpxParameter::StartTime, ParamValue::Integer(a.start_time)),
            (GpxParameter::EndTime, ParamValue::Integer(a.end_time)),
            (GpxParameter::TimeSpan, ParamValue::Integer(a.time_span)),
            (GpxParameter::TimeMoving, ParamValue::Integer(a.time_moving)),
            (GpxParameter::TotalDistanceMoving, ParamValue::Double(a.total_distance_moving)),
            (GpxParameter::DiffElevationUp, ParamValue::Double(a.diff_elevation_up)),
            (GpxParameter::DiffElevationDown, ParamValue::Double(a.diff_elevation_down)),
            (GpxParameter::AvgElevation, ParamValue::Double(a.avg_elevation)),
            (GpxParameter::MinElevation, ParamValue::Double(a.min_elevation)),
            (GpxParameter::MaxElevation, ParamValue::Double(a.max_elevation)),
            (GpxParameter::MaxSpeed, ParamValue::Double(a.max_speed)),
            (GpxParameter::AvgSpeed, ParamValue::Double(a.avg_speed)),
            (GpxParameter::Points, ParamValue::Integer(a.points)),
            (GpxParameter::WptPoints, ParamValue::Integer(a.wpt_points)),
            (GpxParameter::WptCategoryNames, a.wpt_category_names.clone().into()),
            (GpxParameter::StartLat, lat),
            (GpxParameter::StartLon, lon),
        ];
        self.values.extend(entries);
    }
}

/// Cached metadata record for one track file
#[derive(Clone, Debug, PartialEq)]
pub struct GpxDataItem {
    file: PathBuf,
    data: GpxData,
}

impl GpxDataItem {
    /// Bare record for a file that has not been analysed yet
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            data: GpxData::new(),
        }
    }

    pub fn with_data(file: impl Into<PathBuf>, data: GpxData) -> Self {
        Self {
            file: file.into(),
            data,
        }
    }

    #[must_use]
    pub fn file(&self) -> &Path {
        &self.file
    }

    #[must_use]
    pub const fn data(&self) -> &GpxData {
        &self.data
    }

    pub const fn data_mut(&mut self) -> &mut GpxData {
        &mut self.data
    }

    #[must_use]
    pub fn value(&self, parameter: GpxParameter) -> ParamValue {
        self.data.value(parameter)
    }

    pub fn set(&mut self, parameter: GpxParameter, value: impl Into<ParamValue>) -> Result<()> {
        self.data.set(parameter, value)
    }

    #[must_use]
    pub fn analysis(&self) -> Option<TrackAnalysis> {
        self.data.analysis()
    }

    pub fn set_analysis(&mut self, analysis: Option<&TrackAnalysis>) {
        self.data.set_analysis(analysis);
    }

    pub fn set_last_modified(&mut self, millis: i64) {
        self.data.set_last_modified(millis);
    }

    pub fn set_creation_time(&mut self, millis: i64) {
        self.data.set_creation_time(millis);
    }

    pub fn set_nearest_city(&mut self, city: impl Into<String>) {
        self.data.set_nearest_city(city);
    }

    /// Modification time of the file when it was last analysed (ms)
    #[must_use]
    pub fn last_modified(&self) -> i64 {
        self.value(GpxParameter::FileLastModifiedTime)
            .as_i64()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn creation_time(&self) -> i64 {
        self.value(GpxParameter::FileCreationTime).as_i64().unwrap_or(0)
    }

    /// `None` when no city search has been made yet, `Some("")` when the
    /// search found nothing.
    #[must_use]
    pub fn nearest_city(&self) -> Option<String> {
        self.data
            .get(GpxParameter::NearestCityName)
            .and_then(ParamValue::as_str)
            .map(ToString::to_string)
    }

    /// Rebind the record to another file, keeping its data
    #[must_use]
    pub fn renamed(&self, file: impl Into<PathBuf>) -> Self {
        let mut item = Self::new(file);
        item.data.copy_data(&self.data);
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_analysis() -> TrackAnalysis {
        TrackAnalysis {
            total_distance: 1234.5,
            total_tracks: 1,
            start_time: 1_000,
            end_time: 61_000,
            time_span: 60_000,
            points: 42,
            max_speed: 3.5,
            start_location: Some((52.5, 13.4)),
            wpt_category_names: Some("cafe,fuel".to_string()),
            ..TrackAnalysis::default()
        }
    }

    #[test]
    fn test_column_names_are_unique_and_reversible() {
        for p in GpxParameter::ALL {
            assert_eq!(GpxParameter::from_column_name(p.column_name()), Some(p));
        }
        assert_eq!(GpxParameter::from_column_name("nope"), None);
    }

    #[test]
    fn test_type_validation() {
        assert!(GpxParameter::Color.accepts(&ParamValue::Integer(0xFF00_0000)));
        assert!(GpxParameter::Color.accepts(&ParamValue::Null));
        assert!(!GpxParameter::Color.accepts(&ParamValue::Text("red".into())));
        assert!(!GpxParameter::SplitType.accepts(&ParamValue::Null));

        let widened = GpxParameter::SplitInterval.coerce(ParamValue::Integer(5)).unwrap();
        assert_eq!(widened, ParamValue::Double(5.0));

        let err = GpxParameter::ShowArrows
            .coerce(ParamValue::Integer(1))
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_defaults() {
        let data = GpxData::new();
        assert_eq!(data.value(GpxParameter::SplitType), ParamValue::Integer(0));
        assert_eq!(data.value(GpxParameter::Width), ParamValue::Null);
        assert!(data.value(GpxParameter::MaxFilterHdop).as_f64().unwrap().is_nan());
        assert!(data.analysis().is_none());
    }

    #[test]
    fn test_analysis_roundtrip_through_params() {
        let analysis = sample_analysis();
        let mut item = GpxDataItem::new("a.gpx");
        item.set_analysis(Some(&analysis));
        assert_eq!(item.analysis(), Some(analysis));

        item.set_analysis(None);
        assert!(item.analysis().is_none());
        assert!(item.data().get(GpxParameter::StartLat).is_none());
    }

    #[test]
    fn test_clearing_analysis_keeps_appearance() {
        let mut item = GpxDataItem::new("a.gpx");
        item.set(GpxParameter::Color, 0xFFFF_0000_i64).unwrap();
        item.set_analysis(Some(&sample_analysis()));
        item.set_analysis(None);
        assert_eq!(item.value(GpxParameter::Color), ParamValue::Integer(0xFFFF_0000));
    }

    #[test]
    fn test_nearest_city_states() {
        let mut item = GpxDataItem::new("a.gpx");
        assert_eq!(item.nearest_city(), None);
        item.set(GpxParameter::NearestCityName, "").unwrap();
        assert_eq!(item.nearest_city(), Some(String::new()));
        item.set_nearest_city("Leipzig");
        assert_eq!(item.nearest_city().as_deref(), Some("Leipzig"));
    }

    #[test]
    fn test_typed_setters_store_valid_values() {
        let mut item = GpxDataItem::new("a.gpx");
        item.set_last_modified(1_234);
        item.set_creation_time(99);
        assert_eq!(item.last_modified(), 1_234);
        assert_eq!(item.creation_time(), 99);
        for (parameter, value) in item.data().iter() {
            assert!(parameter.accepts(value), "{parameter} holds {value}");
        }
    }

    #[test]
    fn test_renamed_carries_data() {
        let mut item = GpxDataItem::new("old.gpx");
        item.set_analysis(Some(&sample_analysis()));
        let moved = item.renamed("new.gpx");
        assert_eq!(moved.file(), Path::new("new.gpx"));
        assert_eq!(moved.data(), item.data());
    }

    #[test]
    fn test_nan_values_compare_same() {
        let a = ParamValue::Double(f64::NAN);
        assert!(a.same_as(&ParamValue::Double(f64::NAN)));
        assert!(!a.same_as(&ParamValue::Double(1.0)));
    }
}
