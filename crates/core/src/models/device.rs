//! Device signal models sent alongside a claim attempt

use serde::{Deserialize, Serialize};

/// Client platform (closed set — no free-form platform strings)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

/// Location provider reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationProvider {
    Gps,
    Network,
    Fused,
    Unknown,
}

/// Optional device-reported signals used by the risk engine.
///
/// Everything here is client-supplied and therefore untrusted; individual
/// signals only ever add risk, their absence never blocks a claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSignals {
    /// Device-reported speed in m/s
    #[serde(default)]
    pub speed: Option<f64>,
    /// Whether the OS reports the location as mocked
    #[serde(default)]
    pub mock_location: Option<bool>,
    #[serde(default)]
    pub provider: Option<LocationProvider>,
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Platform attestation token; only structurally pre-validated here
    #[serde(default)]
    pub attestation_token: Option<String>,
}
