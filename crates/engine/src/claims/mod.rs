//! The claim pipeline
//!
//! Checks run cheapest-first: cooldown, then the risk engine, then the
//! idempotency claim, and only then the database transaction. Cooldown
//! markers are written after the transaction commits, so a rejected or
//! failed claim never starts a cooldown.

use crate::events::{DomainEvent, EventBus};
use crate::idempotency::{BeginOutcome, IdempotencyGuard};
use crate::ledger::AtomicLedger;
use crate::limits::CooldownGuard;
use crate::metrics::MetricsBuffer;
use crate::risk::RiskEngine;
use geodrop_core::{
    DeviceSignals, EngineConfig, Error, LocationSample, Redemption, RedemptionResult, Result, User,
};
use geodrop_persistence::{Database, SharedStore};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One attempt to claim a reward at a physical location
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub user_id: String,
    pub reward_id: String,
    pub idempotency_key: String,
    pub location: LocationSample,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub signals: DeviceSignals,
}

/// Orchestrates the full claim pipeline
pub struct ClaimService<S> {
    risk: RiskEngine<S>,
    cooldowns: CooldownGuard<S>,
    idempotency: IdempotencyGuard<S>,
    ledger: AtomicLedger,
    events: EventBus,
    metrics: Arc<MetricsBuffer>,
    global_cooldown: Duration,
    city_cooldown: Duration,
}

impl<S: SharedStore> ClaimService<S> {
    pub fn new(
        store: Arc<S>,
        db: Arc<Database>,
        config: EngineConfig,
        events: EventBus,
        metrics: Arc<MetricsBuffer>,
    ) -> Self {
        Self {
            risk: RiskEngine::new(store.clone(), config.risk),
            cooldowns: CooldownGuard::new(store.clone()),
            idempotency: IdempotencyGuard::new(
                store,
                Duration::from_secs(config.idempotency.ttl_secs),
            ),
            ledger: AtomicLedger::new(db),
            events,
            metrics,
            global_cooldown: Duration::from_secs(config.cooldown.global_secs),
            city_cooldown: Duration::from_secs(config.cooldown.city_secs),
        }
    }

    /// Run the full pipeline for one claim attempt.
    ///
    /// A replayed idempotency key short-circuits to the stored result, so
    /// retrying a successful claim returns the identical payload without
    /// touching stock or points again.
    pub async fn redeem(&self, request: &ClaimRequest) -> Result<RedemptionResult> {
        let city = request.city.as_deref();

        match self.cooldowns.remaining(&request.user_id, city).await {
            Ok(Some(remaining_secs)) => {
                return self.reject(Error::CooldownActive { remaining_secs });
            }
            Ok(None) => {}
            // A down store does not lock players out
            Err(e) => warn!("cooldown check failed open for {}: {}", request.user_id, e),
        }

        let verdict = self
            .risk
            .validate(&request.user_id, &request.location, &request.signals)
            .await;
        if !verdict.allowed {
            for violation in verdict.violation_names() {
                self.metrics.record_violation(&violation);
            }
            self.events.emit(DomainEvent::AntiCheatViolation {
                user_id: request.user_id.clone(),
                risk_score: verdict.risk_score,
                violations: verdict.violation_names(),
            });
            return self.reject(Error::AntiCheatViolation {
                risk_score: verdict.risk_score,
                violations: verdict.violation_names(),
            });
        }

        match self.idempotency.begin(&request.idempotency_key).await? {
            BeginOutcome::Completed(payload) => {
                let replay: RedemptionResult = serde_json::from_str(&payload)?;
                return Ok(replay);
            }
            BeginOutcome::InFlight => {
                return self.reject(Error::DuplicateRequest(request.idempotency_key.clone()));
            }
            BeginOutcome::Acquired => {}
        }

        let result = match self
            .ledger
            .execute(&request.user_id, &request.reward_id, &request.idempotency_key)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                // Free the key so the client may retry after a failure
                if let Err(abandon_err) =
                    self.idempotency.abandon(&request.idempotency_key).await
                {
                    warn!(
                        "failed to release idempotency key {}: {}",
                        request.idempotency_key, abandon_err
                    );
                }
                return self.reject(e);
            }
        };

        match serde_json::to_string(&result) {
            Ok(payload) => {
                if let Err(e) = self.idempotency.store(&request.idempotency_key, &payload).await {
                    warn!(
                        "failed to store idempotency result for {}: {}",
                        request.idempotency_key, e
                    );
                }
            }
            Err(e) => warn!("failed to serialize redemption result: {}", e),
        }

        if !self.global_cooldown.is_zero() {
            if let Err(e) = self
                .cooldowns
                .start_cooldown(&request.user_id, self.global_cooldown)
                .await
            {
                warn!("failed to start cooldown for {}: {}", request.user_id, e);
            }
        }
        if let Some(city) = city {
            if !self.city_cooldown.is_zero() {
                if let Err(e) = self
                    .cooldowns
                    .start_city_cooldown(&request.user_id, city, self.city_cooldown)
                    .await
                {
                    warn!("failed to start city cooldown for {}: {}", request.user_id, e);
                }
            }
        }

        self.events.emit(DomainEvent::RedemptionCreated {
            redemption_id: result.redemption_id.clone(),
            user_id: result.user_id.clone(),
            reward_id: result.reward_id.clone(),
            points_spent: result.points_spent,
        });
        self.metrics.record_allowed();

        Ok(result)
    }

    /// Fulfillment scan, with the ledger's authorization rules
    pub async fn fulfill(&self, redemption_id: &str, actor: &User) -> Result<Redemption> {
        let redemption = self.ledger.fulfill(redemption_id, actor).await?;
        self.events.emit(DomainEvent::RedemptionFulfilled {
            redemption_id: redemption.id.clone(),
            scanned_by: actor.id.clone(),
        });
        Ok(redemption)
    }

    /// Ops cancellation
    pub async fn cancel(&self, redemption_id: &str) -> Result<Redemption> {
        let redemption = self.ledger.cancel(redemption_id).await?;
        self.events.emit(DomainEvent::RedemptionCancelled {
            redemption_id: redemption.id.clone(),
        });
        Ok(redemption)
    }

    fn reject<T>(&self, error: Error) -> Result<T> {
        self.metrics.record_rejection(error.reason_code());
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use geodrop_core::{CooldownConfig, Points, RedemptionStatus, Reward, Role};
    use geodrop_persistence::{sqlite, MemoryKv};
    use tokio::sync::mpsc;

    async fn setup(
        config: EngineConfig,
    ) -> (
        Arc<Database>,
        Arc<MetricsBuffer>,
        mpsc::Receiver<DomainEvent>,
        ClaimService<MemoryKv>,
    ) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let db = Arc::new(Database::connect_in_memory().await.unwrap());
        let reward = Reward {
            id: "r1".to_string(),
            name: "Coffee voucher".to_string(),
            partner_id: "p1".to_string(),
            city: Some("lisbon".to_string()),
            cost_points: Points(10),
            active: true,
            has_code_pool: false,
            stock_quantity: 5,
            stock_available: 5,
            stock_reserved: 0,
            created_at: Utc::now(),
        };
        sqlite::create_reward(db.pool(), &reward).await.unwrap();
        let user = User {
            id: "u1".to_string(),
            username: "player-one".to_string(),
            role: Role::Player,
            partner_id: None,
            points_total: Points(100),
            points_available: Points(100),
            points_spent: Points::ZERO,
            created_at: Utc::now(),
        };
        sqlite::create_user(db.pool(), &user).await.unwrap();

        let (events, rx) = EventBus::new(32);
        let metrics = Arc::new(MetricsBuffer::new());
        let service = ClaimService::new(
            Arc::new(MemoryKv::new()),
            db.clone(),
            config,
            events,
            metrics.clone(),
        );
        (db, metrics, rx, service)
    }

    fn request(key: &str, secs_ago: i64) -> ClaimRequest {
        ClaimRequest {
            user_id: "u1".to_string(),
            reward_id: "r1".to_string(),
            idempotency_key: key.to_string(),
            location: LocationSample::new(
                38.7223,
                -9.1393,
                Utc::now() - ChronoDuration::seconds(secs_ago),
            ),
            city: Some("Lisbon".to_string()),
            signals: DeviceSignals::default(),
        }
    }

    #[tokio::test]
    async fn test_successful_claim_emits_event_and_counts() {
        let (db, metrics, mut rx, service) = setup(EngineConfig::default()).await;

        let result = service.redeem(&request("k1", 0)).await.unwrap();
        assert_eq!(result.status, RedemptionStatus::Pending);
        assert_eq!(result.points_spent, Points(10));

        match rx.recv().await {
            Some(DomainEvent::RedemptionCreated {
                redemption_id,
                points_spent,
                ..
            }) => {
                assert_eq!(redemption_id, result.redemption_id);
                assert_eq!(points_spent, Points(10));
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(metrics.flush().claims_allowed, 1);

        let user = sqlite::get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_available, Points(90));
    }

    #[tokio::test]
    async fn test_second_claim_hits_cooldown() {
        let (_db, metrics, _rx, service) = setup(EngineConfig::default()).await;

        service.redeem(&request("k1", 600)).await.unwrap();
        let err = service.redeem(&request("k2", 0)).await.unwrap_err();
        match err {
            Error::CooldownActive { remaining_secs } => {
                assert!(remaining_secs >= 1);
                // City cooldown outlives the global one
                assert!(remaining_secs <= 300);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(metrics.flush().claims_rejected["COOLDOWN_ACTIVE"], 1);
    }

    #[tokio::test]
    async fn test_idempotent_retry_replays_without_second_mutation() {
        let config = EngineConfig {
            cooldown: CooldownConfig {
                global_secs: 0,
                city_secs: 0,
            },
            ..Default::default()
        };
        let (db, _metrics, _rx, service) = setup(config).await;

        let first = service.redeem(&request("k1", 600)).await.unwrap();
        let replay = service.redeem(&request("k1", 0)).await.unwrap();
        assert_eq!(first, replay);

        // One unit of stock and one batch of points moved, not two
        let reward = sqlite::get_reward(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(reward.stock_available, 4);
        let user = sqlite::get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_available, Points(90));
    }

    #[tokio::test]
    async fn test_anti_cheat_denial_blocks_before_any_mutation() {
        let (db, metrics, mut rx, service) = setup(EngineConfig::default()).await;

        let mut request = request("k1", 0);
        request.signals.mock_location = Some(true);
        let err = service.redeem(&request).await.unwrap_err();
        match err {
            Error::AntiCheatViolation {
                risk_score,
                violations,
            } => {
                assert_eq!(risk_score, 40);
                assert_eq!(violations, vec!["MOCK_LOCATION".to_string()]);
            }
            other => panic!("unexpected error: {}", other),
        }

        assert!(matches!(
            rx.recv().await,
            Some(DomainEvent::AntiCheatViolation { .. })
        ));
        let snapshot = metrics.flush();
        assert_eq!(snapshot.violations["MOCK_LOCATION"], 1);
        assert_eq!(snapshot.claims_rejected["ANTI_CHEAT_VIOLATION"], 1);

        let reward = sqlite::get_reward(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(reward.stock_available, 5);
        let user = sqlite::get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_available, Points(100));
    }

    #[tokio::test]
    async fn test_ledger_failure_frees_idempotency_key() {
        let config = EngineConfig {
            cooldown: CooldownConfig {
                global_secs: 0,
                city_secs: 0,
            },
            ..Default::default()
        };
        let (db, metrics, _rx, service) = setup(config).await;
        sqlite::set_active(db.pool(), "r1", false).await.unwrap();

        let err = service.redeem(&request("k1", 600)).await.unwrap_err();
        assert!(matches!(err, Error::RewardNotAvailable(_)));
        assert_eq!(metrics.flush().claims_rejected["REWARD_NOT_AVAILABLE"], 1);

        // Same key works once the reward is active again
        sqlite::set_active(db.pool(), "r1", true).await.unwrap();
        let result = service.redeem(&request("k1", 0)).await.unwrap();
        assert_eq!(result.status, RedemptionStatus::Pending);
    }

    #[tokio::test]
    async fn test_fulfill_and_cancel_emit_events() {
        let (_db, _metrics, mut rx, service) = setup(EngineConfig::default()).await;
        let result = service.redeem(&request("k1", 0)).await.unwrap();
        let _ = rx.recv().await;

        let admin = User {
            id: "admin".to_string(),
            username: "ops".to_string(),
            role: Role::Admin,
            partner_id: None,
            points_total: Points::ZERO,
            points_available: Points::ZERO,
            points_spent: Points::ZERO,
            created_at: Utc::now(),
        };
        let fulfilled = service.fulfill(&result.redemption_id, &admin).await.unwrap();
        assert_eq!(fulfilled.status, RedemptionStatus::Fulfilled);
        assert!(matches!(
            rx.recv().await,
            Some(DomainEvent::RedemptionFulfilled { .. })
        ));

        // Terminal state rejects the cancel, so no event follows
        assert!(service.cancel(&result.redemption_id).await.is_err());
        assert!(rx.try_recv().is_err());
    }
}
