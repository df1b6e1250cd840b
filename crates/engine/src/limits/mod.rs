//! Sliding-window rate counters and cooldown markers
//!
//! Counters increment on every check (rejected attempts still count toward
//! a window); cooldown markers are written only after a successful claim.

use chrono::{DateTime, Utc};
use geodrop_core::Result;
use geodrop_persistence::SharedStore;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a rate-limit check
#[derive(Debug, Clone, PartialEq)]
pub struct LimitDecision {
    pub allowed: bool,
    /// Attempts left in the current window (0 when exhausted)
    pub remaining: i64,
    /// When the current window expires
    pub reset_time: DateTime<Utc>,
}

/// Sliding-window rate limiter over atomic store counters
pub struct RateLimiter<S> {
    store: Arc<S>,
}

impl<S: SharedStore> RateLimiter<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Increment the bucket for this user and report whether the limit is
    /// still respected. The counter's TTL is the window, set when the first
    /// attempt creates it.
    pub async fn check_limit(
        &self,
        bucket: &str,
        user_id: &str,
        limit: i64,
        window: Duration,
    ) -> Result<LimitDecision> {
        let key = format!("rate:{}:{}", bucket, user_id);
        let count = self.store.incr(&key, window).await?;
        let ttl = self
            .store
            .ttl_remaining(&key)
            .await?
            .unwrap_or(window);

        Ok(LimitDecision {
            allowed: count <= limit,
            remaining: (limit - count).max(0),
            reset_time: Utc::now()
                + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero()),
        })
    }

    /// UTC-calendar-day bucketed counter, independent of the rolling daily
    /// window. Both exist on purpose: the rolling window catches bursts,
    /// the calendar bucket catches midnight-reset gaming.
    pub async fn check_calendar_day(&self, user_id: &str, limit: i64) -> Result<LimitDecision> {
        let day = Utc::now().format("%Y%m%d");
        let bucket = format!("claims_day_{}", day);
        // Key carries the date, so a generous TTL just bounds cleanup
        self.check_limit(&bucket, user_id, limit, Duration::from_secs(48 * 60 * 60))
            .await
    }
}

/// Cooldown markers applied after successful claims.
///
/// The global and per-city markers are independent keys with independent
/// TTLs; either one blocks the next claim.
pub struct CooldownGuard<S> {
    store: Arc<S>,
}

impl<S: SharedStore> CooldownGuard<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn global_key(user_id: &str) -> String {
        format!("cooldown:{}", user_id)
    }

    fn city_key(user_id: &str, city: &str) -> String {
        format!("cooldown:{}:{}", user_id, city.to_lowercase())
    }

    /// Set the global cooldown marker
    pub async fn start_cooldown(&self, user_id: &str, window: Duration) -> Result<()> {
        self.store
            .set(&Self::global_key(user_id), &Utc::now().to_rfc3339(), window)
            .await
    }

    /// Set the city-scoped cooldown marker
    pub async fn start_city_cooldown(
        &self,
        user_id: &str,
        city: &str,
        window: Duration,
    ) -> Result<()> {
        self.store
            .set(&Self::city_key(user_id, city), &Utc::now().to_rfc3339(), window)
            .await
    }

    /// Longest remaining cooldown across the global marker and (when a city
    /// is given) the city marker, in whole seconds. None when neither
    /// marker is present.
    pub async fn remaining(&self, user_id: &str, city: Option<&str>) -> Result<Option<i64>> {
        let mut longest: Option<Duration> = None;

        let mut keys = vec![Self::global_key(user_id)];
        if let Some(city) = city {
            keys.push(Self::city_key(user_id, city));
        }

        for key in keys {
            if let Some(ttl) = self.store.ttl_remaining(&key).await? {
                longest = Some(match longest {
                    Some(current) if current >= ttl => current,
                    _ => ttl,
                });
            }
        }

        Ok(longest.map(|d| (d.as_secs_f64().ceil() as i64).max(1)))
    }

    pub async fn is_cooling_down(&self, user_id: &str, city: Option<&str>) -> Result<bool> {
        Ok(self.remaining(user_id, city).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodrop_persistence::MemoryKv;

    const WINDOW: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_limit_allows_up_to_cap_then_rejects() {
        let limiter = RateLimiter::new(Arc::new(MemoryKv::new()));

        for expected_remaining in (0..3).rev() {
            let decision = limiter.check_limit("claims_hourly", "u1", 3, WINDOW).await.unwrap();
            assert!(decision.allowed);
            assert_eq!(decision.remaining, expected_remaining);
        }

        let decision = limiter.check_limit("claims_hourly", "u1", 3, WINDOW).await.unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_time > Utc::now());
    }

    #[tokio::test]
    async fn test_buckets_and_users_are_independent() {
        let limiter = RateLimiter::new(Arc::new(MemoryKv::new()));
        limiter.check_limit("claims_hourly", "u1", 1, WINDOW).await.unwrap();

        let other_bucket = limiter.check_limit("claims_daily", "u1", 1, WINDOW).await.unwrap();
        assert!(other_bucket.allowed);
        let other_user = limiter.check_limit("claims_hourly", "u2", 1, WINDOW).await.unwrap();
        assert!(other_user.allowed);
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(Arc::new(MemoryKv::new()));
        let short = Duration::from_millis(30);

        let first = limiter.check_limit("b", "u1", 1, short).await.unwrap();
        assert!(first.allowed);
        let second = limiter.check_limit("b", "u1", 1, short).await.unwrap();
        assert!(!second.allowed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let third = limiter.check_limit("b", "u1", 1, short).await.unwrap();
        assert!(third.allowed);
    }

    #[tokio::test]
    async fn test_calendar_day_counter_counts_within_day() {
        let limiter = RateLimiter::new(Arc::new(MemoryKv::new()));
        let first = limiter.check_calendar_day("u1", 2).await.unwrap();
        let second = limiter.check_calendar_day("u1", 2).await.unwrap();
        let third = limiter.check_calendar_day("u1", 2).await.unwrap();
        assert!(first.allowed && second.allowed);
        assert!(!third.allowed);
    }

    #[tokio::test]
    async fn test_cooldown_markers_are_independent() {
        let store = Arc::new(MemoryKv::new());
        let guard = CooldownGuard::new(store);

        guard.start_cooldown("u1", Duration::from_secs(60)).await.unwrap();
        assert!(guard.is_cooling_down("u1", None).await.unwrap());
        // City marker not set yet; global alone still blocks
        assert!(guard.is_cooling_down("u1", Some("Lisbon")).await.unwrap());

        guard
            .start_city_cooldown("u1", "Lisbon", Duration::from_secs(300))
            .await
            .unwrap();
        let remaining = guard.remaining("u1", Some("lisbon")).await.unwrap().unwrap();
        // City window is the longer of the two
        assert!(remaining > 60);
        assert!(remaining <= 300);

        // A different user is unaffected
        assert!(!guard.is_cooling_down("u2", Some("Lisbon")).await.unwrap());
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let guard = CooldownGuard::new(Arc::new(MemoryKv::new()));
        guard.start_cooldown("u1", Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!guard.is_cooling_down("u1", None).await.unwrap());
        assert_eq!(guard.remaining("u1", None).await.unwrap(), None);
    }
}
