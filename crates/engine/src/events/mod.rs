//! Domain event fan-out
//!
//! Events are emitted after their state change has committed; dropping an
//! event never affects the outcome of the operation that produced it.

use geodrop_core::Points;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// State changes of interest to downstream consumers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    #[serde(rename_all = "camelCase")]
    RedemptionCreated {
        redemption_id: String,
        user_id: String,
        reward_id: String,
        points_spent: Points,
    },
    #[serde(rename_all = "camelCase")]
    RedemptionFulfilled {
        redemption_id: String,
        scanned_by: String,
    },
    #[serde(rename_all = "camelCase")]
    RedemptionCancelled { redemption_id: String },
    #[serde(rename_all = "camelCase")]
    AntiCheatViolation {
        user_id: String,
        risk_score: u32,
        violations: Vec<String>,
    },
}

/// Bounded, non-blocking event channel
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<DomainEvent>,
}

impl EventBus {
    /// Create the bus and the receiving end for a consumer task
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Fire and forget; a full channel drops the event with a warning
    pub fn emit(&self, event: DomainEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("domain event dropped: {}", e);
        }
    }
}
