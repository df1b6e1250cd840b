//! Per-user location history over the shared store
//!
//! Bounded to the most recent 50 samples per user with a 24h TTL refreshed
//! on every write. Lookups fail open: if the shared store is unreachable
//! the engine sees "no history" rather than blocking gameplay. That trade
//! (availability over anti-cheat completeness) is deliberate and applies
//! to this component only.

use geodrop_core::LocationSample;
use geodrop_persistence::SharedStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Maximum samples retained per user
pub const HISTORY_CAP: usize = 50;

/// History retention window
pub const HISTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounded, time-ordered log of recent location samples per user
pub struct LocationHistory<S> {
    store: Arc<S>,
}

impl<S: SharedStore> LocationHistory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn key(user_id: &str) -> String {
        format!("loc_history:{}", user_id)
    }

    /// Append a sample to the front of the user's history.
    ///
    /// Store failures are logged and swallowed (fail-open policy).
    pub async fn append(&self, user_id: &str, sample: &LocationSample) {
        let payload = match serde_json::to_string(sample) {
            Ok(p) => p,
            Err(e) => {
                warn!("failed to serialize location sample for {}: {}", user_id, e);
                return;
            }
        };

        if let Err(e) = self
            .store
            .list_push_front(&Self::key(user_id), payload, HISTORY_CAP, HISTORY_TTL)
            .await
        {
            warn!("location history append failed for {}: {}", user_id, e);
        }
    }

    /// Most recent sample, if any (fail-open: None on store error)
    pub async fn latest(&self, user_id: &str) -> Option<LocationSample> {
        self.all(user_id).await.into_iter().next()
    }

    /// All stored samples, most-recent-first (fail-open: empty on store
    /// error; entries that fail to parse are skipped)
    pub async fn all(&self, user_id: &str) -> Vec<LocationSample> {
        match self.store.list_all(&Self::key(user_id)).await {
            Ok(entries) => entries
                .iter()
                .filter_map(|raw| serde_json::from_str(raw).ok())
                .collect(),
            Err(e) => {
                warn!("location history lookup failed for {}: {}", user_id, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use geodrop_core::{Error, Result};
    use geodrop_persistence::MemoryKv;

    fn sample(lat: f64, secs_ago: i64) -> LocationSample {
        LocationSample::new(lat, 0.0, Utc::now() - ChronoDuration::seconds(secs_ago))
    }

    #[tokio::test]
    async fn test_append_and_read_back_most_recent_first() {
        let history = LocationHistory::new(Arc::new(MemoryKv::new()));
        history.append("u1", &sample(1.0, 30)).await;
        history.append("u1", &sample(2.0, 20)).await;
        history.append("u1", &sample(3.0, 10)).await;

        let all = history.all("u1").await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].lat, 3.0);
        assert_eq!(history.latest("u1").await.unwrap().lat, 3.0);
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let history = LocationHistory::new(Arc::new(MemoryKv::new()));
        for i in 0..(HISTORY_CAP + 10) {
            history.append("u1", &sample(i as f64, 0)).await;
        }
        assert_eq!(history.all("u1").await.len(), HISTORY_CAP);
    }

    #[tokio::test]
    async fn test_empty_history() {
        let history = LocationHistory::new(Arc::new(MemoryKv::new()));
        assert!(history.all("u1").await.is_empty());
        assert!(history.latest("u1").await.is_none());
    }

    /// Store that errors on every operation
    struct DownStore;

    impl SharedStore for DownStore {
        async fn list_push_front(
            &self,
            _key: &str,
            _value: String,
            _cap: usize,
            _ttl: std::time::Duration,
        ) -> Result<()> {
            Err(Error::StoreError("down".into()))
        }
        async fn list_all(&self, _key: &str) -> Result<Vec<String>> {
            Err(Error::StoreError("down".into()))
        }
        async fn incr(&self, _key: &str, _ttl: std::time::Duration) -> Result<i64> {
            Err(Error::StoreError("down".into()))
        }
        async fn set_nx(
            &self,
            _key: &str,
            _value: &str,
            _ttl: std::time::Duration,
        ) -> Result<bool> {
            Err(Error::StoreError("down".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: std::time::Duration) -> Result<()> {
            Err(Error::StoreError("down".into()))
        }
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::StoreError("down".into()))
        }
        async fn delete(&self, _key: &str) -> Result<()> {
            Err(Error::StoreError("down".into()))
        }
        async fn exists(&self, _key: &str) -> Result<bool> {
            Err(Error::StoreError("down".into()))
        }
        async fn ttl_remaining(&self, _key: &str) -> Result<Option<std::time::Duration>> {
            Err(Error::StoreError("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_outage_reads_as_no_history() {
        let history = LocationHistory::new(Arc::new(DownStore));
        history.append("u1", &sample(1.0, 0)).await;
        assert!(history.all("u1").await.is_empty());
        assert!(history.latest("u1").await.is_none());
    }
}
