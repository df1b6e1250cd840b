//! Redemption persistence and conditional status transitions

use chrono::{DateTime, Utc};
use geodrop_core::{Error, Points, Redemption, RedemptionStatus, Result};
use sqlx::SqlitePool;

/// Redemption record as stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
struct RedemptionRow {
    id: String,
    user_id: String,
    reward_id: String,
    points_spent: i64,
    status: String,
    code_id: Option<i64>,
    idempotency_key: String,
    created_at: DateTime<Utc>,
    fulfilled_at: Option<DateTime<Utc>>,
}

impl RedemptionRow {
    fn into_redemption(self) -> Result<Redemption> {
        let status = RedemptionStatus::parse(&self.status)
            .ok_or_else(|| Error::InvalidData(format!("unknown status: {}", self.status)))?;
        Ok(Redemption {
            id: self.id,
            user_id: self.user_id,
            reward_id: self.reward_id,
            points_spent: Points(self.points_spent),
            status,
            code_id: self.code_id,
            idempotency_key: self.idempotency_key,
            created_at: self.created_at,
            fulfilled_at: self.fulfilled_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, reward_id, points_spent, status, code_id,
           idempotency_key, created_at, fulfilled_at
    FROM redemptions
"#;

/// Insert a new redemption record
pub async fn insert_redemption(pool: &SqlitePool, redemption: &Redemption) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO redemptions (id, user_id, reward_id, points_spent, status, code_id,
                                 idempotency_key, created_at, fulfilled_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&redemption.id)
    .bind(&redemption.user_id)
    .bind(&redemption.reward_id)
    .bind(redemption.points_spent.0)
    .bind(redemption.status.as_str())
    .bind(redemption.code_id)
    .bind(&redemption.idempotency_key)
    .bind(redemption.created_at)
    .bind(redemption.fulfilled_at)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Fetch a redemption by id
pub async fn get_redemption(pool: &SqlitePool, id: &str) -> Result<Option<Redemption>> {
    let row: Option<RedemptionRow> =
        sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    row.map(RedemptionRow::into_redemption).transpose()
}

/// Atomically transition a PENDING redemption to a terminal status.
///
/// Returns whether the transition happened; `false` means the record was
/// already terminal (or unknown), so terminal states absorb repeat scans.
pub async fn transition_status(
    pool: &SqlitePool,
    id: &str,
    next: RedemptionStatus,
    fulfilled_at: Option<DateTime<Utc>>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE redemptions
        SET status = ?, fulfilled_at = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(next.as_str())
    .bind(fulfilled_at)
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Redemption history for a user, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    limit: u32,
    offset: u32,
) -> Result<Vec<Redemption>> {
    let rows: Vec<RedemptionRow> = sqlx::query_as(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    rows.into_iter().map(RedemptionRow::into_redemption).collect()
}
