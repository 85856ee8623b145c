//! Range filters over analysed records
//!
//! A filter holds the full slider range (`min..max`) and the selected
//! window (`from..to`). Values are compared in the user's units. When the
//! window touches an end of the range, values beyond that end are accepted
//! too, so an open slider never hides outliers.

use gpxdb_common::GpxDataItem;

const METERS_IN_KILOMETER: f64 = 1000.0;
const METERS_IN_ONE_MILE: f64 = 1609.344;
const METERS_IN_ONE_NAUTICAL_MILE: f64 = 1852.0;

/// Unit system used for display
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetricSystem {
    #[default]
    Kilometers,
    Miles,
    NauticalMiles,
}

impl MetricSystem {
    /// Metres in one distance unit
    #[must_use]
    pub const fn meters_per_unit(self) -> f64 {
        match self {
            Self::Kilometers => METERS_IN_KILOMETER,
            Self::Miles => METERS_IN_ONE_MILE,
            Self::NauticalMiles => METERS_IN_ONE_NAUTICAL_MILE,
        }
    }

    /// Factor from m/s to km/h, mph or knots
    #[must_use]
    pub const fn speed_factor(self) -> f64 {
        match self {
            Self::Kilometers => 3.6,
            Self::Miles => 2.237,
            Self::NauticalMiles => 1.943_84,
        }
    }

    #[must_use]
    pub const fn distance_unit(self) -> &'static str {
        match self {
            Self::Kilometers => "km",
            Self::Miles => "mi",
            Self::NauticalMiles => "nm",
        }
    }

    #[must_use]
    pub const fn speed_unit(self) -> &'static str {
        match self {
            Self::Kilometers => "km/h",
            Self::Miles => "mph",
            Self::NauticalMiles => "kn",
        }
    }
}

/// What a range filter measures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    /// Total distance
    Length,
    /// Maximum speed
    MaxSpeed,
}

impl FilterKind {
    /// Upper end of the default slider range, in display units
    #[must_use]
    pub const fn default_max(self) -> f64 {
        match self {
            Self::Length => 300.0,
            Self::MaxSpeed => 150.0,
        }
    }

    /// Value of the record in display units, `None` if unknown or zero
    fn value_of(self, item: &GpxDataItem, metric: MetricSystem) -> Option<f64> {
        let analysis = item.analysis()?;
        let value = match self {
            Self::Length => analysis.total_distance / metric.meters_per_unit(),
            Self::MaxSpeed => analysis.max_speed * metric.speed_factor(),
        };
        (value != 0.0).then_some(value)
    }
}

/// Slider-style filter over one measurement
#[derive(Clone, Debug, PartialEq)]
pub struct RangeFilter {
    pub kind: FilterKind,
    pub min: f64,
    pub max: f64,
    pub from: f64,
    pub to: f64,
}

impl RangeFilter {
    /// Filter with its window open over the default range
    #[must_use]
    pub const fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            min: 0.0,
            max: kind.default_max(),
            from: 0.0,
            to: kind.default_max(),
        }
    }

    /// Narrow the window, clamped to the range
    #[must_use]
    pub fn with_window(mut self, from: f64, to: f64) -> Self {
        self.from = from.clamp(self.min, self.max);
        self.to = to.clamp(self.from, self.max);
        self
    }

    /// Whether the window excludes anything
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_enabled(&self) -> bool {
        self.from != self.min || self.to != self.max
    }

    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn accepts(&self, item: &GpxDataItem, metric: MetricSystem) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let Some(value) = self.kind.value_of(item, metric) else {
            return false;
        };
        (value > self.from && value < self.to)
            || (value < self.min && self.from == self.min)
            || (value > self.max && self.to == self.max)
    }
}

/// A set of filters that must all accept a record
#[derive(Clone, Debug, Default)]
pub struct TrackFilters {
    pub metric: MetricSystem,
    pub filters: Vec<RangeFilter>,
}

impl TrackFilters {
    #[must_use]
    pub const fn new(metric: MetricSystem) -> Self {
        Self {
            metric,
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, filter: RangeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn accepts(&self, item: &GpxDataItem) -> bool {
        self.filters.iter().all(|f| f.accepts(item, self.metric))
    }

    /// Keep the accepted records
    #[must_use]
    pub fn apply(&self, items: Vec<GpxDataItem>) -> Vec<GpxDataItem> {
        items.into_iter().filter(|item| self.accepts(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpxdb_common::TrackAnalysis;

    fn track(distance_m: f64, max_speed_ms: f64) -> GpxDataItem {
        let mut item = GpxDataItem::new("t.gpx");
        item.set_analysis(Some(&TrackAnalysis {
            total_distance: distance_m,
            max_speed: max_speed_ms,
            points: 2,
            ..TrackAnalysis::default()
        }));
        item
    }

    #[test]
    fn test_open_filter_accepts_everything() {
        let filter = RangeFilter::new(FilterKind::Length);
        assert!(!filter.is_enabled());
        assert!(filter.accepts(&GpxDataItem::new("x.gpx"), MetricSystem::Kilometers));
    }

    #[test]
    fn test_length_window_in_kilometers() {
        let filter = RangeFilter::new(FilterKind::Length).with_window(5.0, 10.0);
        let km = MetricSystem::Kilometers;
        assert!(filter.accepts(&track(7_000.0, 1.0), km));
        assert!(!filter.accepts(&track(4_000.0, 1.0), km));
        assert!(!filter.accepts(&track(12_000.0, 1.0), km));
        assert!(!filter.accepts(&track(0.0, 1.0), km), "zero length is unknown");
    }

    #[test]
    fn test_length_window_in_miles() {
        let filter = RangeFilter::new(FilterKind::Length).with_window(1.0, 2.0);
        assert!(filter.accepts(&track(2_000.0, 1.0), MetricSystem::Miles));
        assert!(!filter.accepts(&track(2_000.0, 1.0), MetricSystem::Kilometers));
    }

    #[test]
    fn test_window_touching_max_accepts_outliers() {
        let filter = RangeFilter::new(FilterKind::MaxSpeed).with_window(20.0, 150.0);
        // 50 m/s = 180 km/h, beyond the slider range
        assert!(filter.accepts(&track(1.0, 50.0), MetricSystem::Kilometers));
        // 5 m/s = 18 km/h, below the window
        assert!(!filter.accepts(&track(1.0, 5.0), MetricSystem::Kilometers));
    }

    #[test]
    fn test_combined_filters() {
        let filters = TrackFilters::new(MetricSystem::Kilometers)
            .with(RangeFilter::new(FilterKind::Length).with_window(1.0, 300.0))
            .with(RangeFilter::new(FilterKind::MaxSpeed).with_window(0.0, 30.0));
        let kept = filters.apply(vec![
            track(5_000.0, 5.0),
            track(5_000.0, 20.0),
            track(500.0, 5.0),
        ]);
        assert_eq!(kept.len(), 1);
        assert!((kept[0].analysis().unwrap().max_speed - 5.0).abs() < f64::EPSILON);
    }
}
