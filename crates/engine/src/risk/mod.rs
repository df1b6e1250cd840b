//! The anti-cheat risk engine
//!
//! Runs the independent checks, accumulates their outcomes into a single
//! verdict, and records the attempted location in history whether or not
//! the attempt was allowed. Individual checks fail open on store errors;
//! the engine as a whole fails closed on anything unexpected.

pub mod checks;

use crate::history::LocationHistory;
use crate::limits::RateLimiter;
use geodrop_core::{
    CheckOutcome, DeviceSignals, Error, LocationSample, Result, RiskConfig, RiskVerdict,
    ViolationKind,
};
use geodrop_persistence::SharedStore;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Validates location-based actions against the configured checks
pub struct RiskEngine<S> {
    config: RiskConfig,
    history: LocationHistory<S>,
    limiter: RateLimiter<S>,
}

impl<S: SharedStore> RiskEngine<S> {
    pub fn new(store: Arc<S>, config: RiskConfig) -> Self {
        Self {
            config,
            history: LocationHistory::new(store.clone()),
            limiter: RateLimiter::new(store),
        }
    }

    /// Validate one attempted action.
    ///
    /// Never returns an error: expected violations land in the verdict, and
    /// an unexpected internal failure produces the fail-closed verdict
    /// (denied, SUSPICIOUS_PATTERN, maximum score). The sampled location is
    /// appended to history in every case.
    pub async fn validate(
        &self,
        user_id: &str,
        location: &LocationSample,
        signals: &DeviceSignals,
    ) -> RiskVerdict {
        let stored = self.history.all(user_id).await;

        let verdict = match self.run_checks(user_id, location, signals, &stored).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("risk validation failed closed for {}: {}", user_id, e);
                RiskVerdict::deny_all()
            }
        };

        // History reflects attempts, not just successes
        self.history.append(user_id, location).await;

        if verdict.allowed {
            debug!("validation passed for {} (score {})", user_id, verdict.risk_score);
        } else {
            warn!(
                "validation denied for {} (score {}, violations {:?})",
                user_id, verdict.risk_score, verdict.violations
            );
        }
        verdict
    }

    async fn run_checks(
        &self,
        user_id: &str,
        location: &LocationSample,
        signals: &DeviceSignals,
        stored: &[LocationSample],
    ) -> Result<RiskVerdict> {
        if !location.lat.is_finite()
            || !location.lng.is_finite()
            || location.lat.abs() > 90.0
            || location.lng.abs() > 180.0
        {
            return Err(Error::InvalidData(format!(
                "coordinates out of range: ({}, {})",
                location.lat, location.lng
            )));
        }

        let config = &self.config;
        let prev = stored.first();
        let mut verdict = RiskVerdict::clean();

        verdict.merge(
            "speed",
            ViolationKind::SpeedViolation,
            checks::check_speed(config, prev, location, signals),
        );
        verdict.merge(
            "mockLocation",
            ViolationKind::MockLocation,
            checks::check_mock_location(config, location, signals),
        );
        verdict.merge(
            "teleportation",
            ViolationKind::Teleportation,
            checks::check_teleportation(config, prev, location),
        );
        verdict.merge(
            "rapidClaimsHourly",
            ViolationKind::RapidClaims,
            self.rate_outcome(user_id, "claims_hourly", config.hourly_claim_limit, HOUR, 35)
                .await,
        );
        verdict.merge(
            "rapidClaimsDaily",
            ViolationKind::RapidClaims,
            self.rate_outcome(user_id, "claims_daily", config.daily_claim_limit, DAY, 25)
                .await,
        );
        verdict.merge(
            "dailyLimit",
            ViolationKind::DailyLimitExceeded,
            self.calendar_day_outcome(user_id).await,
        );
        verdict.merge(
            "accuracy",
            ViolationKind::PoorAccuracy,
            checks::check_accuracy(config, location),
        );
        if let Some(token) = &signals.attestation_token {
            verdict.merge(
                "attestation",
                ViolationKind::InvalidAttestation,
                checks::check_attestation(token),
            );
        }
        verdict.merge(
            "pattern",
            ViolationKind::SuspiciousPattern,
            checks::check_pattern(config, stored),
        );

        Ok(verdict)
    }

    /// Sliding-window counter check; fails open if the store is down
    async fn rate_outcome(
        &self,
        user_id: &str,
        bucket: &str,
        limit: i64,
        window: Duration,
        risk_score: u32,
    ) -> CheckOutcome {
        match self.limiter.check_limit(bucket, user_id, limit, window).await {
            Ok(decision) if decision.allowed => CheckOutcome::ok(),
            Ok(decision) => CheckOutcome::flagged(risk_score)
                .with_detail("limit", json!(limit))
                .with_detail("resetTime", json!(decision.reset_time.to_rfc3339())),
            Err(e) => {
                warn!("rate check {} failed open for {}: {}", bucket, user_id, e);
                CheckOutcome::ok()
            }
        }
    }

    /// Calendar-day counter check; fails open if the store is down
    async fn calendar_day_outcome(&self, user_id: &str) -> CheckOutcome {
        match self
            .limiter
            .check_calendar_day(user_id, self.config.calendar_day_limit)
            .await
        {
            Ok(decision) if decision.allowed => CheckOutcome::ok(),
            Ok(decision) => CheckOutcome::flagged(30)
                .with_detail("limit", json!(self.config.calendar_day_limit))
                .with_detail("resetTime", json!(decision.reset_time.to_rfc3339())),
            Err(e) => {
                warn!("daily limit check failed open for {}: {}", user_id, e);
                CheckOutcome::ok()
            }
        }
    }
}
