//! The atomic claim/redemption transaction
//!
//! Order matters: stock is reserved before points are spent, and points
//! are spent before the redemption record exists. Each step is a single
//! conditional database update; failure at any step rolls back everything
//! done before it. Stock release and point refund are this module's
//! responsibility, never the caller's.

use chrono::Utc;
use geodrop_core::{
    Error, FulfillmentCode, Points, Redemption, RedemptionResult, RedemptionStatus, Result, Role,
    User,
};
use geodrop_persistence::{sqlite, Database};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Executes stock/point transactions against the document store
pub struct AtomicLedger {
    db: Arc<Database>,
}

impl AtomicLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Execute one claim/redemption transaction.
    ///
    /// Sequence: reserve stock, spend points, allocate a code (best
    /// effort), persist the PENDING redemption, confirm the reservation.
    /// Concurrent requests for the last unit are serialized by the
    /// conditional decrement in step one, not by any in-process lock.
    pub async fn execute(
        &self,
        user_id: &str,
        reward_id: &str,
        idempotency_key: &str,
    ) -> Result<RedemptionResult> {
        let pool = self.db.pool();

        let reward = sqlite::get_reward(pool, reward_id)
            .await?
            .ok_or_else(|| Error::RewardNotFound(reward_id.to_string()))?;
        if !reward.active {
            return Err(Error::RewardNotAvailable(reward_id.to_string()));
        }
        let user = sqlite::get_user(pool, user_id)
            .await?
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;
        let cost = reward.cost_points;

        // Step 1: reserve stock (compare-and-decrement)
        if !sqlite::reserve_stock(pool, reward_id).await? {
            return Err(Error::OutOfStock(reward_id.to_string()));
        }

        // Step 2: spend points, releasing the reservation on failure
        if cost > Points::ZERO {
            let spent = match sqlite::spend_points(pool, user_id, cost).await {
                Ok(spent) => spent,
                Err(e) => {
                    self.release_stock(reward_id).await;
                    return Err(e);
                }
            };
            if !spent {
                self.release_stock(reward_id).await;
                return Err(Error::InsufficientPoints {
                    required: cost,
                    available: user.points_available,
                });
            }
        }

        // Step 3: code allocation is best effort; an empty pool is not fatal
        let code = if reward.has_code_pool {
            match sqlite::allocate_code(pool, reward_id).await {
                Ok(code) => code,
                Err(e) => {
                    warn!("code allocation failed for {}: {}", reward_id, e);
                    None
                }
            }
        } else {
            None
        };

        // Step 4: persist the redemption record
        let redemption = Redemption {
            id: generate_redemption_id(),
            user_id: user_id.to_string(),
            reward_id: reward_id.to_string(),
            points_spent: cost,
            status: RedemptionStatus::Pending,
            code_id: code.as_ref().map(|c| c.id),
            idempotency_key: idempotency_key.to_string(),
            created_at: Utc::now(),
            fulfilled_at: None,
        };
        if let Err(e) = sqlite::insert_redemption(pool, &redemption).await {
            self.compensate(reward_id, user_id, cost, code.as_ref()).await;
            return Err(e);
        }

        // Step 5: confirm the reservation; the unit stays deducted from
        // availability
        let confirmed = sqlite::confirm_reservation(pool, reward_id).await;
        if !matches!(confirmed, Ok(true)) {
            self.compensate(reward_id, user_id, cost, code.as_ref()).await;
            // The record exists but holds nothing; mark it cancelled
            let _ = sqlite::transition_status(
                pool,
                &redemption.id,
                RedemptionStatus::Cancelled,
                None,
            )
            .await;
            return match confirmed {
                Err(e) => Err(e),
                _ => Err(Error::DatabaseError(format!(
                    "reservation confirm failed for {}",
                    reward_id
                ))),
            };
        }

        info!(
            "redemption {} created: user {} reward {} cost {}",
            redemption.id, user_id, reward_id, cost
        );

        Ok(RedemptionResult {
            redemption_id: redemption.id,
            user_id: redemption.user_id,
            reward_id: redemption.reward_id,
            points_spent: cost,
            status: redemption.status,
            code: code.map(|c| c.code),
            created_at: redemption.created_at,
        })
    }

    /// Fulfillment scan: transition PENDING -> FULFILLED.
    ///
    /// Allowed for the redeeming user, admin/moderator roles, and partner
    /// users whose partner matches the reward's owner.
    pub async fn fulfill(&self, redemption_id: &str, actor: &User) -> Result<Redemption> {
        let pool = self.db.pool();
        let redemption = sqlite::get_redemption(pool, redemption_id)
            .await?
            .ok_or_else(|| Error::RedemptionNotFound(redemption_id.to_string()))?;
        let reward = sqlite::get_reward(pool, &redemption.reward_id)
            .await?
            .ok_or_else(|| Error::RewardNotFound(redemption.reward_id.clone()))?;

        let authorized = actor.id == redemption.user_id
            || matches!(actor.role, Role::Admin | Role::Moderator)
            || (actor.role == Role::Partner
                && actor.partner_id.as_deref() == Some(reward.partner_id.as_str()));
        if !authorized {
            return Err(Error::UnauthorizedScan(redemption_id.to_string()));
        }

        let now = Utc::now();
        if !sqlite::transition_status(pool, redemption_id, RedemptionStatus::Fulfilled, Some(now))
            .await?
        {
            return Err(Error::InvalidTransition {
                from: redemption.status.as_str().to_string(),
                to: RedemptionStatus::Fulfilled.as_str().to_string(),
            });
        }

        info!("redemption {} fulfilled by {}", redemption_id, actor.id);

        Ok(Redemption {
            status: RedemptionStatus::Fulfilled,
            fulfilled_at: Some(now),
            ..redemption
        })
    }

    /// Ops cancellation: transition PENDING -> CANCELLED and return the
    /// allocated code to the pool, if any.
    pub async fn cancel(&self, redemption_id: &str) -> Result<Redemption> {
        let pool = self.db.pool();
        let redemption = sqlite::get_redemption(pool, redemption_id)
            .await?
            .ok_or_else(|| Error::RedemptionNotFound(redemption_id.to_string()))?;

        if !sqlite::transition_status(pool, redemption_id, RedemptionStatus::Cancelled, None)
            .await?
        {
            return Err(Error::InvalidTransition {
                from: redemption.status.as_str().to_string(),
                to: RedemptionStatus::Cancelled.as_str().to_string(),
            });
        }

        if let Some(code_id) = redemption.code_id {
            if let Err(e) = sqlite::release_code(pool, code_id).await {
                warn!("failed to return code {} to pool: {}", code_id, e);
            }
        }

        info!("redemption {} cancelled", redemption_id);

        Ok(Redemption {
            status: RedemptionStatus::Cancelled,
            ..redemption
        })
    }

    /// Release a reservation made in step one
    async fn release_stock(&self, reward_id: &str) {
        if let Err(e) = sqlite::release_reservation(self.db.pool(), reward_id).await {
            warn!("stock release failed for {}: {}", reward_id, e);
        }
    }

    /// Undo steps one through three after a later step failed: stock back
    /// to available, points refunded, code back to the pool. Refunding
    /// points here keeps the rollback symmetric with the stock rollback.
    async fn compensate(
        &self,
        reward_id: &str,
        user_id: &str,
        cost: Points,
        code: Option<&FulfillmentCode>,
    ) {
        self.release_stock(reward_id).await;
        if cost > Points::ZERO {
            if let Err(e) = sqlite::refund_points(self.db.pool(), user_id, cost).await {
                warn!("point refund failed for {}: {}", user_id, e);
            }
        }
        if let Some(code) = code {
            if let Err(e) = sqlite::release_code(self.db.pool(), code.id).await {
                warn!("code release failed for {}: {}", code.id, e);
            }
        }
    }
}

/// Random redemption identifier
fn generate_redemption_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect();
    format!("rdm_{}", suffix)
}
