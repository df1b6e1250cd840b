//! User persistence and atomic point-ledger operations

use chrono::{DateTime, Utc};
use geodrop_core::{Error, Points, Result, Role, User};
use sqlx::SqlitePool;

/// User record as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    role: String,
    partner_id: Option<String>,
    points_total: i64,
    points_available: i64,
    points_spent: i64,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| Error::InvalidData(format!("unknown role: {}", self.role)))?;
        Ok(User {
            id: self.id,
            username: self.username,
            role,
            partner_id: self.partner_id,
            points_total: Points(self.points_total),
            points_available: Points(self.points_available),
            points_spent: Points(self.points_spent),
            created_at: self.created_at,
        })
    }
}

/// Insert a new user
pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, role, partner_id, points_total, points_available, points_spent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(user.role.as_str())
    .bind(&user.partner_id)
    .bind(user.points_total.0)
    .bind(user.points_available.0)
    .bind(user.points_spent.0)
    .bind(user.created_at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Fetch a user by id
pub async fn get_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        r#"
        SELECT id, username, role, partner_id, points_total, points_available, points_spent, created_at
        FROM users WHERE id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(UserRow::into_user).transpose()
}

/// Atomically spend points, conditioned on sufficient available balance.
///
/// Returns whether the debit happened. A `false` result means the balance
/// was insufficient at the moment of the update (or the user is unknown).
pub async fn spend_points(pool: &SqlitePool, user_id: &str, cost: Points) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET points_available = points_available - ?,
            points_spent = points_spent + ?
        WHERE id = ? AND points_available >= ?
        "#,
    )
    .bind(cost.0)
    .bind(cost.0)
    .bind(user_id)
    .bind(cost.0)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Atomically refund a previous spend, conditioned on that spend still
/// being recorded. Cannot push `points_available` above `points_total`
/// because `points_spent` is decremented in the same statement.
pub async fn refund_points(pool: &SqlitePool, user_id: &str, amount: Points) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET points_available = points_available + ?,
            points_spent = points_spent - ?
        WHERE id = ? AND points_spent >= ?
        "#,
    )
    .bind(amount.0)
    .bind(amount.0)
    .bind(user_id)
    .bind(amount.0)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Grant points (earned through gameplay); raises total and available
pub async fn add_points(pool: &SqlitePool, user_id: &str, amount: Points) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET points_total = points_total + ?,
            points_available = points_available + ?
        WHERE id = ?
        "#,
    )
    .bind(amount.0)
    .bind(amount.0)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::Database;

    fn test_user(id: &str, available: i64) -> User {
        User {
            id: id.to_string(),
            username: format!("user-{}", id),
            role: Role::Player,
            partner_id: None,
            points_total: Points(available),
            points_available: Points(available),
            points_spent: Points::ZERO,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_spend_points_respects_balance() {
        let db = Database::connect_in_memory().await.unwrap();
        create_user(db.pool(), &test_user("u1", 100)).await.unwrap();

        assert!(spend_points(db.pool(), "u1", Points(60)).await.unwrap());
        // Second spend of 60 exceeds the remaining 40
        assert!(!spend_points(db.pool(), "u1", Points(60)).await.unwrap());

        let user = get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_available, Points(40));
        assert_eq!(user.points_spent, Points(60));
        assert!(user.point_invariant_holds());
    }

    #[tokio::test]
    async fn test_refund_cannot_exceed_spent() {
        let db = Database::connect_in_memory().await.unwrap();
        create_user(db.pool(), &test_user("u1", 100)).await.unwrap();
        spend_points(db.pool(), "u1", Points(30)).await.unwrap();

        assert!(refund_points(db.pool(), "u1", Points(30)).await.unwrap());
        // Nothing spent anymore, refund must fail
        assert!(!refund_points(db.pool(), "u1", Points(1)).await.unwrap());

        let user = get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_available, Points(100));
        assert!(user.point_invariant_holds());
    }

    #[tokio::test]
    async fn test_spend_for_unknown_user_fails() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(!spend_points(db.pool(), "nobody", Points(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_points_raises_total_and_available() {
        let db = Database::connect_in_memory().await.unwrap();
        create_user(db.pool(), &test_user("u1", 10)).await.unwrap();
        assert!(add_points(db.pool(), "u1", Points(25)).await.unwrap());

        let user = get_user(db.pool(), "u1").await.unwrap().unwrap();
        assert_eq!(user.points_total, Points(35));
        assert_eq!(user.points_available, Points(35));
    }
}
