//! Redemption records and their status state machine

use crate::types::Points;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Redemption lifecycle status.
///
/// `Pending -> Fulfilled` (fulfillment scan) or `Pending -> Cancelled`
/// (ops action). Fulfilled and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RedemptionStatus {
    Pending,
    Fulfilled,
    Cancelled,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Pending => "PENDING",
            RedemptionStatus::Fulfilled => "FULFILLED",
            RedemptionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<RedemptionStatus> {
        match s {
            "PENDING" => Some(RedemptionStatus::Pending),
            "FULFILLED" => Some(RedemptionStatus::Fulfilled),
            "CANCELLED" => Some(RedemptionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RedemptionStatus::Fulfilled | RedemptionStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: RedemptionStatus) -> bool {
        matches!(
            (self, next),
            (
                RedemptionStatus::Pending,
                RedemptionStatus::Fulfilled | RedemptionStatus::Cancelled
            )
        )
    }
}

/// A redemption created by a successful claim transaction.
///
/// Immutable once written except for the status transition and
/// `fulfilled_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub points_spent: Points,
    pub status: RedemptionStatus,
    #[serde(default)]
    pub code_id: Option<i64>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// Result payload returned to the caller (and replayed on idempotent
/// retries, so it must serialize deterministically)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionResult {
    pub redemption_id: String,
    pub user_id: String,
    pub reward_id: String,
    pub points_spent: Points,
    pub status: RedemptionStatus,
    /// Fulfillment code text, if one was allocated from the pool
    #[serde(default)]
    pub code: Option<String>,
    pub created_at: DateTime<Utc>,
}
