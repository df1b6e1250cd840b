//! Risk verdict models produced by the anti-cheat engine

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Maximum risk score, assigned when validation fails closed
pub const MAX_RISK_SCORE: u32 = 100;

/// Kind of anti-cheat violation (closed set)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    SpeedViolation,
    MockLocation,
    Teleportation,
    RapidClaims,
    CooldownViolation,
    DailyLimitExceeded,
    SuspiciousPattern,
    InvalidAttestation,
    PoorAccuracy,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::SpeedViolation => "SPEED_VIOLATION",
            ViolationKind::MockLocation => "MOCK_LOCATION",
            ViolationKind::Teleportation => "TELEPORTATION",
            ViolationKind::RapidClaims => "RAPID_CLAIMS",
            ViolationKind::CooldownViolation => "COOLDOWN_VIOLATION",
            ViolationKind::DailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            ViolationKind::SuspiciousPattern => "SUSPICIOUS_PATTERN",
            ViolationKind::InvalidAttestation => "INVALID_ATTESTATION",
            ViolationKind::PoorAccuracy => "POOR_ACCURACY",
        }
    }
}

/// Outcome of a single risk check: fixed shape, no dynamic result objects.
///
/// `details` stays a loose JSON map because its content is diagnostic only
/// and never drives control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub valid: bool,
    pub risk_score: u32,
    #[serde(default)]
    pub details: serde_json::Map<String, Value>,
}

impl CheckOutcome {
    /// A passing check contributing no risk
    pub fn ok() -> Self {
        Self {
            valid: true,
            risk_score: 0,
            details: serde_json::Map::new(),
        }
    }

    /// A failed check contributing the given risk score
    pub fn flagged(risk_score: u32) -> Self {
        Self {
            valid: false,
            risk_score,
            details: serde_json::Map::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Aggregated verdict for one validation request.
///
/// Created fresh per request, consumed immediately by the claim
/// orchestrator, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskVerdict {
    pub allowed: bool,
    pub violations: BTreeSet<ViolationKind>,
    pub risk_score: u32,
    pub details: serde_json::Map<String, Value>,
}

impl RiskVerdict {
    /// Threshold at or above which a request is denied even without a
    /// named violation
    pub const RISK_THRESHOLD: u32 = 20;

    /// Start with a clean verdict; checks are merged in afterwards
    pub fn clean() -> Self {
        Self {
            allowed: true,
            violations: BTreeSet::new(),
            risk_score: 0,
            details: serde_json::Map::new(),
        }
    }

    /// Fail-closed verdict used when validation hits an unexpected
    /// internal error
    pub fn deny_all() -> Self {
        let mut violations = BTreeSet::new();
        violations.insert(ViolationKind::SuspiciousPattern);
        Self {
            allowed: false,
            violations,
            risk_score: MAX_RISK_SCORE,
            details: serde_json::Map::new(),
        }
    }

    /// Merge one check's outcome under the given name, tagging the
    /// violation kind when the check failed
    pub fn merge(&mut self, name: &str, kind: ViolationKind, outcome: CheckOutcome) {
        self.risk_score += outcome.risk_score;
        if !outcome.valid {
            self.violations.insert(kind);
        }
        if !outcome.details.is_empty() {
            self.details
                .insert(name.to_string(), Value::Object(outcome.details));
        }
        self.allowed = self.violations.is_empty() && self.risk_score < Self::RISK_THRESHOLD;
    }

    pub fn violation_names(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.as_str().to_string()).collect()
    }
}
