//! Geodrop Engine - Anti-cheat validation and the atomic claim/redemption
//! transaction

pub mod claims;
pub mod events;
pub mod geo;
pub mod history;
pub mod idempotency;
pub mod ledger;
pub mod limits;
pub mod metrics;
pub mod risk;

pub use claims::{ClaimRequest, ClaimService};
pub use events::{DomainEvent, EventBus};
pub use ledger::AtomicLedger;
pub use metrics::MetricsBuffer;
pub use risk::RiskEngine;
