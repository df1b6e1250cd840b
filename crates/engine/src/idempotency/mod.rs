//! Idempotency guard for safe client retries
//!
//! The check-and-reserve is itself atomic: a conditional insert of a
//! placeholder claims the key before the transaction runs, so two
//! concurrent requests with the same fresh key cannot both execute.

use geodrop_core::Result;
use geodrop_persistence::SharedStore;
use std::sync::Arc;
use std::time::Duration;

/// Placeholder stored while the first execution is still in flight
const PENDING_MARKER: &str = "__pending__";

/// Outcome of attempting to claim an idempotency key
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// Key was fresh; the caller now owns execution
    Acquired,
    /// Another request holds the key but has not finished
    InFlight,
    /// A previous execution completed; its stored payload is returned
    Completed(String),
}

/// Maps caller-supplied idempotency keys to stored result payloads
pub struct IdempotencyGuard<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: SharedStore> IdempotencyGuard<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(idempotency_key: &str) -> String {
        format!("idem:{}", idempotency_key)
    }

    /// Atomically claim the key or report its current state
    pub async fn begin(&self, idempotency_key: &str) -> Result<BeginOutcome> {
        let key = Self::key(idempotency_key);

        if self.store.set_nx(&key, PENDING_MARKER, self.ttl).await? {
            return Ok(BeginOutcome::Acquired);
        }

        match self.store.get(&key).await? {
            Some(value) if value == PENDING_MARKER => Ok(BeginOutcome::InFlight),
            Some(value) => Ok(BeginOutcome::Completed(value)),
            // Expired between the set_nx and the get; one more claim attempt
            None => {
                if self.store.set_nx(&key, PENDING_MARKER, self.ttl).await? {
                    Ok(BeginOutcome::Acquired)
                } else {
                    Ok(BeginOutcome::InFlight)
                }
            }
        }
    }

    /// Replace the placeholder with the final result payload
    pub async fn store(&self, idempotency_key: &str, payload: &str) -> Result<()> {
        self.store
            .set(&Self::key(idempotency_key), payload, self.ttl)
            .await
    }

    /// Drop the placeholder after a failed execution so the client can
    /// retry with the same key
    pub async fn abandon(&self, idempotency_key: &str) -> Result<()> {
        self.store.delete(&Self::key(idempotency_key)).await
    }
}
