//! Reward catalog models and the stock ledger fields

use crate::types::Points;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A redeemable reward (or claimable prize) with its stock ledger.
///
/// Stock invariant: `stock_available + stock_reserved <= stock_quantity`
/// and every field is non-negative. The three stock fields are only ever
/// mutated through the atomic conditional updates in the persistence
/// layer, never by direct assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub name: String,
    /// Partner that owns this reward; partner users may scan its codes
    pub partner_id: String,
    #[serde(default)]
    pub city: Option<String>,
    /// Cost in points; zero for pure-claim prize flows
    pub cost_points: Points,
    pub active: bool,
    /// Whether fulfillment codes come from a pre-seeded pool
    pub has_code_pool: bool,
    pub stock_quantity: i64,
    pub stock_available: i64,
    pub stock_reserved: i64,
    pub created_at: DateTime<Utc>,
}

impl Reward {
    /// Check the stock ledger invariant (used by tests and reconciliation)
    pub fn stock_invariant_holds(&self) -> bool {
        self.stock_available >= 0
            && self.stock_reserved >= 0
            && self.stock_available + self.stock_reserved <= self.stock_quantity
    }
}

/// A single fulfillment code from a reward's code pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentCode {
    pub id: i64,
    pub reward_id: String,
    pub code: String,
    pub assigned: bool,
}
