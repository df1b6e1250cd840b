//! Reward persistence and atomic stock-ledger operations
//!
//! `reserve_stock` is the operation that serializes concurrent claims for
//! the last unit: a compare-and-decrement, never a read-then-write.

use chrono::{DateTime, Utc};
use geodrop_core::{Error, Points, Result, Reward};
use sqlx::SqlitePool;

/// Reward record as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct RewardRow {
    id: String,
    name: String,
    partner_id: String,
    city: Option<String>,
    cost_points: i64,
    active: bool,
    has_code_pool: bool,
    stock_quantity: i64,
    stock_available: i64,
    stock_reserved: i64,
    created_at: DateTime<Utc>,
}

impl From<RewardRow> for Reward {
    fn from(row: RewardRow) -> Self {
        Reward {
            id: row.id,
            name: row.name,
            partner_id: row.partner_id,
            city: row.city,
            cost_points: Points(row.cost_points),
            active: row.active,
            has_code_pool: row.has_code_pool,
            stock_quantity: row.stock_quantity,
            stock_available: row.stock_available,
            stock_reserved: row.stock_reserved,
            created_at: row.created_at,
        }
    }
}

/// Insert a new reward
pub async fn create_reward(pool: &SqlitePool, reward: &Reward) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO rewards (id, name, partner_id, city, cost_points, active, has_code_pool,
                             stock_quantity, stock_available, stock_reserved, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&reward.id)
    .bind(&reward.name)
    .bind(&reward.partner_id)
    .bind(&reward.city)
    .bind(reward.cost_points.0)
    .bind(reward.active)
    .bind(reward.has_code_pool)
    .bind(reward.stock_quantity)
    .bind(reward.stock_available)
    .bind(reward.stock_reserved)
    .bind(reward.created_at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Fetch a reward by id
pub async fn get_reward(pool: &SqlitePool, reward_id: &str) -> Result<Option<Reward>> {
    let row: Option<RewardRow> = sqlx::query_as(
        r#"
        SELECT id, name, partner_id, city, cost_points, active, has_code_pool,
               stock_quantity, stock_available, stock_reserved, created_at
        FROM rewards WHERE id = ?
        "#,
    )
    .bind(reward_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Reward::from))
}

/// Atomically reserve one unit of stock, conditioned on availability and
/// the reward being active. Returns whether the reservation happened.
pub async fn reserve_stock(pool: &SqlitePool, reward_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET stock_available = stock_available - 1,
            stock_reserved = stock_reserved + 1
        WHERE id = ? AND active = 1 AND stock_available >= 1
        "#,
    )
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Atomically release a reservation back to available stock
pub async fn release_reservation(pool: &SqlitePool, reward_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET stock_available = stock_available + 1,
            stock_reserved = stock_reserved - 1
        WHERE id = ? AND stock_reserved >= 1
        "#,
    )
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Atomically confirm a reservation: the unit leaves `stock_reserved` and
/// stays deducted from `stock_available`.
pub async fn confirm_reservation(pool: &SqlitePool, reward_id: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET stock_reserved = stock_reserved - 1
        WHERE id = ? AND stock_reserved >= 1
        "#,
    )
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Add stock (admin restock). Raises quantity and availability together so
/// the stock invariant cannot break, regardless of outstanding
/// reservations.
pub async fn restock(pool: &SqlitePool, reward_id: &str, additional: i64) -> Result<bool> {
    if additional < 0 {
        return Err(Error::InvalidData(format!(
            "restock amount must be non-negative, got {}",
            additional
        )));
    }

    let result = sqlx::query(
        r#"
        UPDATE rewards
        SET stock_quantity = stock_quantity + ?,
            stock_available = stock_available + ?
        WHERE id = ?
        "#,
    )
    .bind(additional)
    .bind(additional)
    .bind(reward_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Enable or disable a reward
pub async fn set_active(pool: &SqlitePool, reward_id: &str, active: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE rewards SET active = ? WHERE id = ?")
        .bind(active)
        .bind(reward_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sqlite::Database;

    pub(crate) fn test_reward(id: &str, stock: i64) -> Reward {
        Reward {
            id: id.to_string(),
            name: format!("Reward {}", id),
            partner_id: "p1".to_string(),
            city: Some("lisbon".to_string()),
            cost_points: Points(10),
            active: true,
            has_code_pool: false,
            stock_quantity: stock,
            stock_available: stock,
            stock_reserved: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reserve_until_exhausted() {
        let db = Database::connect_in_memory().await.unwrap();
        create_reward(db.pool(), &test_reward("r1", 2)).await.unwrap();

        assert!(reserve_stock(db.pool(), "r1").await.unwrap());
        assert!(reserve_stock(db.pool(), "r1").await.unwrap());
        assert!(!reserve_stock(db.pool(), "r1").await.unwrap());

        let reward = get_reward(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(reward.stock_available, 0);
        assert_eq!(reward.stock_reserved, 2);
        assert!(reward.stock_invariant_holds());
    }

    #[tokio::test]
    async fn test_inactive_reward_cannot_be_reserved() {
        let db = Database::connect_in_memory().await.unwrap();
        create_reward(db.pool(), &test_reward("r1", 5)).await.unwrap();
        set_active(db.pool(), "r1", false).await.unwrap();

        assert!(!reserve_stock(db.pool(), "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_release_and_confirm_preserve_invariant() {
        let db = Database::connect_in_memory().await.unwrap();
        create_reward(db.pool(), &test_reward("r1", 3)).await.unwrap();

        reserve_stock(db.pool(), "r1").await.unwrap();
        reserve_stock(db.pool(), "r1").await.unwrap();

        assert!(release_reservation(db.pool(), "r1").await.unwrap());
        assert!(confirm_reservation(db.pool(), "r1").await.unwrap());
        // No reservations remain to release or confirm
        assert!(!release_reservation(db.pool(), "r1").await.unwrap());
        assert!(!confirm_reservation(db.pool(), "r1").await.unwrap());

        let reward = get_reward(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(reward.stock_available, 2);
        assert_eq!(reward.stock_reserved, 0);
        // One unit confirmed, so available + reserved == quantity - 1
        assert_eq!(
            reward.stock_available + reward.stock_reserved,
            reward.stock_quantity - 1
        );
        assert!(reward.stock_invariant_holds());
    }

    #[tokio::test]
    async fn test_restock_raises_quantity_and_availability() {
        let db = Database::connect_in_memory().await.unwrap();
        create_reward(db.pool(), &test_reward("r1", 1)).await.unwrap();
        reserve_stock(db.pool(), "r1").await.unwrap();

        assert!(restock(db.pool(), "r1", 4).await.unwrap());
        let reward = get_reward(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(reward.stock_quantity, 5);
        assert_eq!(reward.stock_available, 4);
        assert_eq!(reward.stock_reserved, 1);
        assert!(reward.stock_invariant_holds());
    }
}
