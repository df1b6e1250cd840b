//! Individual anti-cheat checks
//!
//! Each check is a pure function producing a fixed-shape [`CheckOutcome`];
//! the engine merges outcomes into the final verdict. Details are
//! diagnostic only.

use crate::geo;
use geodrop_core::{
    CheckOutcome, DeviceSignals, LocationProvider, LocationSample, Meters, MetersPerSecond,
    RiskConfig,
};
use serde_json::json;

/// Speed plausibility.
///
/// Device-reported speed over the limit flags immediately; otherwise the
/// speed derived from the previous stored sample is judged, with a
/// harsher score above the outright-impossible threshold. Samples closer
/// together than the minimum interval are flagged as too frequent.
pub fn check_speed(
    config: &RiskConfig,
    prev: Option<&LocationSample>,
    current: &LocationSample,
    signals: &DeviceSignals,
) -> CheckOutcome {
    let max_speed = config.max_speed_ms();

    if let Some(reported) = signals.speed {
        if MetersPerSecond(reported) > max_speed {
            return CheckOutcome::flagged(30)
                .with_detail("reportedSpeed", json!(reported))
                .with_detail("maxSpeed", json!(max_speed));
        }
    }

    let Some(prev) = prev else {
        return CheckOutcome::ok();
    };

    let elapsed_secs = (current.timestamp - prev.timestamp).num_seconds();
    if elapsed_secs < config.min_sample_interval_secs {
        return CheckOutcome::flagged(20)
            .with_detail("elapsedSecs", json!(elapsed_secs))
            .with_detail("reason", json!("samples too frequent"));
    }

    let derived = geo::speed(prev, current);
    if derived > config.suspicious_speed_ms {
        CheckOutcome::flagged(50).with_detail("derivedSpeed", json!(derived))
    } else if derived > max_speed {
        CheckOutcome::flagged(30).with_detail("derivedSpeed", json!(derived))
    } else {
        CheckOutcome::ok()
    }
}

/// Mock-location detection: explicit OS flag, or the heuristic of an
/// implausibly perfect fix (zero accuracy, or sub-5m accuracy from a
/// network provider).
pub fn check_mock_location(
    config: &RiskConfig,
    current: &LocationSample,
    signals: &DeviceSignals,
) -> CheckOutcome {
    if signals.mock_location == Some(true) {
        return CheckOutcome::flagged(40).with_detail("reportedMock", json!(true));
    }

    if let Some(accuracy) = current.accuracy {
        if accuracy == 0.0 {
            return CheckOutcome::flagged(20)
                .with_detail("accuracy", json!(0.0))
                .with_detail("reason", json!("exact zero accuracy"));
        }
        if Meters(accuracy) < config.mock_accuracy_floor_m
            && signals.provider == Some(LocationProvider::Network)
        {
            return CheckOutcome::flagged(20)
                .with_detail("accuracy", json!(accuracy))
                .with_detail("reason", json!("perfect accuracy from network provider"));
        }
    }

    CheckOutcome::ok()
}

/// Teleportation: a large jump in a short window, independent of the
/// speed check (one movement can fail both).
pub fn check_teleportation(
    config: &RiskConfig,
    prev: Option<&LocationSample>,
    current: &LocationSample,
) -> CheckOutcome {
    let Some(prev) = prev else {
        return CheckOutcome::ok();
    };

    let elapsed_secs = (current.timestamp - prev.timestamp).num_seconds();
    let jump = geo::distance(&prev.point(), &current.point());

    if jump > config.teleport_distance_m
        && (0..config.teleport_window_secs).contains(&elapsed_secs)
    {
        CheckOutcome::flagged(45)
            .with_detail("distanceM", json!(jump))
            .with_detail("elapsedSecs", json!(elapsed_secs))
    } else {
        CheckOutcome::ok()
    }
}

/// Reported GPS accuracy worse than the ceiling
pub fn check_accuracy(config: &RiskConfig, current: &LocationSample) -> CheckOutcome {
    match current.accuracy {
        Some(accuracy) if Meters(accuracy) > config.accuracy_ceiling_m => CheckOutcome::flagged(15)
            .with_detail("accuracy", json!(accuracy))
            .with_detail("ceiling", json!(config.accuracy_ceiling_m)),
        _ => CheckOutcome::ok(),
    }
}

/// Structural attestation pre-validation: three dot-separated parts with a
/// base64url JSON object payload. Real cryptographic verification is the
/// attestation service's job, not ours.
pub fn check_attestation(token: &str) -> CheckOutcome {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return CheckOutcome::flagged(25)
            .with_detail("reason", json!("token is not three non-empty parts"));
    }

    let Ok(payload) = URL_SAFE_NO_PAD.decode(parts[1]) else {
        return CheckOutcome::flagged(25)
            .with_detail("reason", json!("payload is not valid base64url"));
    };

    match serde_json::from_slice::<serde_json::Value>(&payload) {
        Ok(value) if value.is_object() => CheckOutcome::ok(),
        _ => CheckOutcome::flagged(25)
            .with_detail("reason", json!("payload is not a JSON object")),
    }
}

/// Movement-pattern analysis over stored samples (most-recent-first).
///
/// Near-identical consecutive distances imply scripted movement; repeated
/// impossible hop speeds imply replay or spoofing. Skipped entirely below
/// the minimum sample count so new users are never penalized.
pub fn check_pattern(config: &RiskConfig, samples: &[LocationSample]) -> CheckOutcome {
    if samples.len() < config.pattern_min_samples {
        return CheckOutcome::ok();
    }

    let mut distances = Vec::with_capacity(samples.len() - 1);
    let mut impossible_hops = 0usize;
    for pair in samples.windows(2) {
        // Most-recent-first, so pair[1] precedes pair[0] in time
        let (later, earlier) = (&pair[0], &pair[1]);
        distances.push(geo::distance(&earlier.point(), &later.point()).as_f64());
        if geo::speed(earlier, later) > config.suspicious_speed_ms {
            impossible_hops += 1;
        }
    }

    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    let variance = distances
        .iter()
        .map(|d| (d - mean).powi(2))
        .sum::<f64>()
        / distances.len() as f64;
    let regularity = if mean > 0.0 {
        (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
    } else {
        // Identical points every time is perfectly regular
        1.0
    };

    let mut outcome = CheckOutcome::ok()
        .with_detail("regularity", json!(regularity))
        .with_detail("impossibleHops", json!(impossible_hops));

    if regularity > config.regularity_threshold {
        let span = 1.0 - config.regularity_threshold;
        let score = ((regularity - config.regularity_threshold) / span * 20.0).ceil() as u32;
        outcome.valid = false;
        outcome.risk_score += score.min(20);
    }

    if impossible_hops > config.impossible_travel_max {
        outcome.valid = false;
        outcome.risk_score += 25;
    }

    outcome
}
