//! Configuration for the anti-cheat and claim pipeline
//!
//! Plain serde structs with documented defaults; injected into the components
//! that use them rather than read from ambient globals.

use crate::types::{Meters, MetersPerSecond};
use serde::{Deserialize, Serialize};

/// Thresholds for the risk engine checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskConfig {
    /// Maximum plausible travel speed in km/h
    pub max_speed_kmh: f64,
    /// Speed above this is treated as outright impossible
    pub suspicious_speed_ms: MetersPerSecond,
    /// Samples closer together than this are flagged as too frequent
    pub min_sample_interval_secs: i64,
    /// Jump distance that counts as teleportation
    pub teleport_distance_m: Meters,
    /// Teleportation only applies within this elapsed window
    pub teleport_window_secs: i64,
    /// Reported accuracy worse than this is penalized
    pub accuracy_ceiling_m: Meters,
    /// Accuracy better than this from a network provider looks spoofed
    pub mock_accuracy_floor_m: Meters,
    /// Claims allowed per rolling hour
    pub hourly_claim_limit: i64,
    /// Claims allowed per rolling 24h window
    pub daily_claim_limit: i64,
    /// Claims allowed per UTC calendar day (independent of the rolling window)
    pub calendar_day_limit: i64,
    /// Minimum stored samples before pattern analysis applies
    pub pattern_min_samples: usize,
    /// Movement regularity above this is treated as bot-like
    pub regularity_threshold: f64,
    /// Impossible-travel hops tolerated before flagging
    pub impossible_travel_max: usize,
}

impl RiskConfig {
    /// Maximum plausible speed in m/s
    pub fn max_speed_ms(&self) -> MetersPerSecond {
        MetersPerSecond::from_kmh(self.max_speed_kmh)
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: 120.0,
            suspicious_speed_ms: MetersPerSecond(50.0),
            min_sample_interval_secs: 5,
            teleport_distance_m: Meters(1000.0),
            teleport_window_secs: 60,
            accuracy_ceiling_m: Meters(100.0),
            mock_accuracy_floor_m: Meters(5.0),
            hourly_claim_limit: 10,
            daily_claim_limit: 50,
            calendar_day_limit: 50,
            pattern_min_samples: 5,
            regularity_threshold: 0.95,
            impossible_travel_max: 3,
        }
    }
}

/// Cooldown windows applied after a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CooldownConfig {
    /// Global per-user cooldown in seconds
    pub global_secs: u64,
    /// Per-city cooldown in seconds (independent key and TTL)
    pub city_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            global_secs: 60,
            city_secs: 300,
        }
    }
}

/// Idempotency record retention
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdempotencyConfig {
    /// How long stored results outlive the original request; must cover
    /// realistic client retry windows
    pub ttl_secs: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 6 * 60 * 60,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub cooldown: CooldownConfig,
    pub idempotency: IdempotencyConfig,
}
