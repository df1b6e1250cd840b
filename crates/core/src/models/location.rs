//! Location-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A geographic coordinate pair (WGS84 degrees)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A single GPS sample recorded for a user.
///
/// Owned by the location history store: capped at 50 entries per user and
/// expired after 24 hours. Appended on every validated action, whether or
/// not the action was allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
    /// Reported GPS accuracy in meters (smaller is better)
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl LocationSample {
    pub fn new(lat: f64, lng: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat,
            lng,
            timestamp,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Axis-aligned bounding box (inclusive on all edges)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}
