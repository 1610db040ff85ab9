use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A WGS84 position stored as (longitude, latitude), the order used by
/// directions providers and GeoJSON.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    /// Build a point, rejecting coordinates outside the WGS84 ranges.
    pub fn new(lon: f64, lat: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&lat) || lat.is_nan() {
            return Err(CoreError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) || lon.is_nan() {
            return Err(CoreError::Longitude(lon));
        }
        Ok(Self { lon, lat })
    }

    /// Build a point without range checks. Used when reading rows that were
    /// validated on write.
    pub const fn unchecked(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Axis-aligned lat/lon box used to pre-filter rows before an exact
/// great-circle check.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lon >= self.min_lon && p.lon <= self.max_lon
    }
}
