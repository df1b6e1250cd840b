//! Shared type definitions and newtypes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point balance amount.
///
/// Serializes transparently as its inner integer, so wire payloads and
/// database rows stay plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Points(pub i64);

impl Points {
    pub const ZERO: Points = Points(0);

    pub fn new(amount: i64) -> Self {
        Points(amount)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Whether this balance can cover the given cost
    pub fn covers(&self, cost: Points) -> bool {
        self.0 >= cost.0
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Distance in meters
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Meters(pub f64);

impl Meters {
    pub fn new(value: f64) -> Self {
        Meters(value)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// Speed in meters per second
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct MetersPerSecond(pub f64);

impl MetersPerSecond {
    pub fn new(value: f64) -> Self {
        MetersPerSecond(value)
    }

    /// Convert from km/h (how speed limits are configured)
    pub fn from_kmh(kmh: f64) -> Self {
        MetersPerSecond(kmh / 3.6)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}
