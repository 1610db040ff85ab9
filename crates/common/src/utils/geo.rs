//! Great-circle helpers.
//!
//! Distances use the haversine formula on a spherical Earth of mean radius
//! 6371.0088 km. That is accurate to well under 0.5% which is more than
//! enough for "is this within 500 m" and for fare estimates.

use crate::types::{BoundingBox, GeoPoint};

pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// True when `b` lies within `radius_m` metres of `a`.
pub fn within_radius_m(a: GeoPoint, b: GeoPoint, radius_m: f64) -> bool {
    haversine_km(a, b) * 1000.0 <= radius_m
}

/// Smallest lat/lon box containing the circle of `radius_km` around `center`.
///
/// Near the poles the longitude span degenerates, so it is widened to the
/// full range there.
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let dlat = (radius_km / EARTH_RADIUS_KM).to_degrees();
    let cos_lat = center.lat.to_radians().cos();
    let (min_lon, max_lon) = if cos_lat.abs() < 1e-6 {
        (-180.0, 180.0)
    } else {
        let dlon = (radius_km / (EARTH_RADIUS_KM * cos_lat)).to_degrees().abs();
        ((center.lon - dlon).max(-180.0), (center.lon + dlon).min(180.0))
    };
    BoundingBox {
        min_lat: (center.lat - dlat).max(-90.0),
        max_lat: (center.lat + dlat).min(90.0),
        min_lon,
        max_lon,
    }
}
