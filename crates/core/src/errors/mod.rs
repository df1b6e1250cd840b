//! Error types and Result alias for the Geodrop backend core

use crate::types::Points;
use thiserror::Error;

/// Main error type for the claim/redemption core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    #[error("Reward not available: {0}")]
    RewardNotAvailable(String),

    #[error("Reward is out of stock: {0}")]
    OutOfStock(String),

    #[error("Insufficient points: required {required}, available {available}")]
    InsufficientPoints {
        required: Points,
        available: Points,
    },

    #[error("Claim cooldown active: {remaining_secs}s remaining")]
    CooldownActive { remaining_secs: i64 },

    #[error("Anti-cheat violation (risk score {risk_score}): {violations:?}")]
    AntiCheatViolation {
        risk_score: u32,
        violations: Vec<String>,
    },

    #[error("Duplicate request for idempotency key: {0}")]
    DuplicateRequest(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Redemption not found: {0}")]
    RedemptionNotFound(String),

    #[error("Actor is not authorized to scan this redemption: {0}")]
    UnauthorizedScan(String),

    #[error("Invalid redemption status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Shared store error: {0}")]
    StoreError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Stable machine-readable reason code for client-facing responses.
    ///
    /// Rejection outcomes map 1:1 to these identifiers; infrastructure and
    /// contract errors collapse into generic codes so internal error text
    /// never leaks to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::RewardNotFound(_) => "REWARD_NOT_FOUND",
            Error::RewardNotAvailable(_) => "REWARD_NOT_AVAILABLE",
            Error::OutOfStock(_) => "OUT_OF_STOCK",
            Error::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Error::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            Error::AntiCheatViolation { .. } => "ANTI_CHEAT_VIOLATION",
            Error::DuplicateRequest(_) => "DUPLICATE_REQUEST",
            Error::UserNotFound(_) => "USER_NOT_FOUND",
            Error::RedemptionNotFound(_) => "REDEMPTION_NOT_FOUND",
            Error::UnauthorizedScan(_) => "UNAUTHORIZED_REDEMPTION_SCAN",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::DatabaseError(_) | Error::StoreError(_) => "INTERNAL_ERROR",
            Error::InvalidData(_) => "INVALID_REQUEST",
        }
    }

    /// Whether this is an expected, user-facing rejection (vs. an
    /// infrastructure or contract failure).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Error::DatabaseError(_) | Error::StoreError(_) | Error::InvalidData(_)
        )
    }
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(Error::OutOfStock("r1".into()).reason_code(), "OUT_OF_STOCK");
        assert_eq!(
            Error::InsufficientPoints {
                required: Points(10),
                available: Points(3)
            }
            .reason_code(),
            "INSUFFICIENT_POINTS"
        );
        assert_eq!(
            Error::CooldownActive { remaining_secs: 42 }.reason_code(),
            "COOLDOWN_ACTIVE"
        );
    }

    #[test]
    fn test_infrastructure_errors_are_not_rejections() {
        assert!(!Error::DatabaseError("down".into()).is_rejection());
        assert!(!Error::StoreError("down".into()).is_rejection());
        assert!(Error::OutOfStock("r1".into()).is_rejection());
    }
}
