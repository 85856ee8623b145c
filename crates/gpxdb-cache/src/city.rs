//! Nearest-city lookup seam.

/// Resolves the name of the city nearest to a coordinate.
///
/// Backed by whatever place index the host application has; lookups run on
/// the reader thread.
pub trait CityResolver: Send + Sync {
    fn nearest_city(&self, lat: f64, lon: f64) -> Option<String>;
}

/// Resolver for hosts without a place index
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCityResolver;

impl CityResolver for NoCityResolver {
    fn nearest_city(&self, _lat: f64, _lon: f64) -> Option<String> {
        None
    }
}
