//! User models and the point ledger fields

use crate::types::Points;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role supplied by the authentication layer (trusted, not re-verified)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Moderator,
    Admin,
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "player",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Partner => "partner",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "player" => Some(Role::Player),
            "moderator" => Some(Role::Moderator),
            "admin" => Some(Role::Admin),
            "partner" => Some(Role::Partner),
            _ => None,
        }
    }
}

/// A player (or staff) account with its point ledger.
///
/// Point invariant: `0 <= points_available <= points_total`. The point
/// fields are only mutated through atomic spend/refund/add operations in
/// the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    /// Set when `role == Partner`; scopes which rewards this user may scan
    #[serde(default)]
    pub partner_id: Option<String>,
    pub points_total: Points,
    pub points_available: Points,
    pub points_spent: Points,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check the point ledger invariant (used by tests and reconciliation)
    pub fn point_invariant_holds(&self) -> bool {
        self.points_available >= Points::ZERO && self.points_total.covers(self.points_available)
    }
}
