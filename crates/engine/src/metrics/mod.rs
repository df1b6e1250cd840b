//! In-process claim counters
//!
//! Counters accumulate in memory and are drained to the log on a timer.
//! Losing a flush loses nothing durable; the authoritative record is the
//! database.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub claims_allowed: u64,
    /// Rejections keyed by stable reason code
    pub claims_rejected: HashMap<String, u64>,
    /// Anti-cheat violations keyed by violation name
    pub violations: HashMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn is_empty(&self) -> bool {
        self.claims_allowed == 0 && self.claims_rejected.is_empty() && self.violations.is_empty()
    }
}

/// Accumulates claim outcome counters between flushes
#[derive(Default)]
pub struct MetricsBuffer {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_allowed(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.claims_allowed += 1;
        }
    }

    pub fn record_rejection(&self, reason_code: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.claims_rejected.entry(reason_code.to_string()).or_insert(0) += 1;
        }
    }

    pub fn record_violation(&self, violation: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner.violations.entry(violation.to_string()).or_insert(0) += 1;
        }
    }

    /// Drain the current counters, logging anything non-empty
    pub fn flush(&self) -> MetricsSnapshot {
        let snapshot = match self.inner.lock() {
            Ok(mut inner) => std::mem::take(&mut *inner),
            Err(_) => MetricsSnapshot::default(),
        };
        if !snapshot.is_empty() {
            info!(
                "claim metrics: {} allowed, rejected {:?}, violations {:?}",
                snapshot.claims_allowed, snapshot.claims_rejected, snapshot.violations
            );
        }
        snapshot
    }

    /// Periodic flush task; performs a final flush when the shutdown signal
    /// fires
    pub fn spawn_flush_loop(
        buffer: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        buffer.flush();
                    }
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            buffer.flush();
                            break;
                        }
                    }
                }
            }
        })
    }
}
