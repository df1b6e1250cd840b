//! Pure geospatial math: distances, bearings, speeds, containment
//!
//! Everything here is deterministic for the same floating-point inputs and
//! free of side effects.

use geodrop_core::{BoundingBox, GeoPoint, LocationSample, Meters, MetersPerSecond};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points (Haversine).
///
/// Symmetric, and zero for identical points.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> Meters {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    Meters(EARTH_RADIUS_M * c)
}

/// Initial bearing from `a` to `b` in degrees, normalized to [0, 360)
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let y = d_lng.sin() * lat_b.cos();
    let x = lat_a.cos() * lat_b.sin() - lat_a.sin() * lat_b.cos() * d_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Travel speed between two samples.
///
/// Returns 0 when the timestamps coincide; equal timestamps are a defined
/// input, not an error.
pub fn speed(from: &LocationSample, to: &LocationSample) -> MetersPerSecond {
    let elapsed_ms = (to.timestamp - from.timestamp).num_milliseconds().abs();
    if elapsed_ms == 0 {
        return MetersPerSecond(0.0);
    }
    MetersPerSecond(distance(&from.point(), &to.point()).as_f64() / (elapsed_ms as f64 / 1000.0))
}

/// Inclusive bounding-box containment
pub fn is_within_bounds(point: &GeoPoint, bounds: &BoundingBox) -> bool {
    point.lat >= bounds.min_lat
        && point.lat <= bounds.max_lat
        && point.lng >= bounds.min_lng
        && point.lng <= bounds.max_lng
}

/// Ray-casting polygon containment.
///
/// Behavior for points exactly on an edge is unspecified; callers must not
/// depend on edge inclusivity.
pub fn is_within_polygon(point: &GeoPoint, polygon: &[GeoPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = &polygon[i];
        let b = &polygon[j];
        let crosses = (a.lat > point.lat) != (b.lat > point.lat)
            && point.lng < (b.lng - a.lng) * (point.lat - a.lat) / (b.lat - a.lat) + a.lng;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}
