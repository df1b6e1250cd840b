//! Fulfillment code pool operations

use geodrop_core::{Error, FulfillmentCode, Result};
use sqlx::SqlitePool;

#[derive(Debug, Clone, sqlx::FromRow)]
struct CodeRow {
    id: i64,
    reward_id: String,
    code: String,
    assigned: bool,
}

impl From<CodeRow> for FulfillmentCode {
    fn from(row: CodeRow) -> Self {
        FulfillmentCode {
            id: row.id,
            reward_id: row.reward_id,
            code: row.code,
            assigned: row.assigned,
        }
    }
}

/// Seed a reward's code pool
pub async fn seed_codes(pool: &SqlitePool, reward_id: &str, codes: &[String]) -> Result<()> {
    for code in codes {
        sqlx::query("INSERT INTO fulfillment_codes (reward_id, code, assigned) VALUES (?, ?, 0)")
            .bind(reward_id)
            .bind(code)
            .execute(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;
    }
    Ok(())
}

/// Atomically claim one unassigned code from the pool, if any.
///
/// The inner SELECT and the assignment happen in a single statement, so
/// two concurrent redemptions cannot receive the same code.
pub async fn allocate_code(pool: &SqlitePool, reward_id: &str) -> Result<Option<FulfillmentCode>> {
    let row: Option<CodeRow> = sqlx::query_as(
        r#"
        UPDATE fulfillment_codes
        SET assigned = 1
        WHERE id = (
            SELECT id FROM fulfillment_codes
            WHERE reward_id = ? AND assigned = 0
            ORDER BY id
            LIMIT 1
        ) AND assigned = 0
        RETURNING id, reward_id, code, assigned
        "#,
    )
    .bind(reward_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(FulfillmentCode::from))
}

/// Return a code to the pool (compensation path)
pub async fn release_code(pool: &SqlitePool, code_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE fulfillment_codes SET assigned = 0 WHERE id = ?")
        .bind(code_id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected() == 1)
}

/// Fetch a code by id
pub async fn get_code(pool: &SqlitePool, code_id: i64) -> Result<Option<FulfillmentCode>> {
    let row: Option<CodeRow> =
        sqlx::query_as("SELECT id, reward_id, code, assigned FROM fulfillment_codes WHERE id = ?")
            .bind(code_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(FulfillmentCode::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::rewards::tests::test_reward;
    use crate::sqlite::{create_reward, Database};

    /// Fresh database with the reward row the code fixtures reference,
    /// satisfying the fulfillment_codes table's foreign key.
    async fn setup() -> Database {
        let db = Database::connect_in_memory().await.unwrap();
        create_reward(db.pool(), &test_reward("r1", 10)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_allocate_drains_pool_without_duplicates() {
        let db = setup().await;
        let codes = vec!["AAA".to_string(), "BBB".to_string()];
        seed_codes(db.pool(), "r1", &codes).await.unwrap();

        let first = allocate_code(db.pool(), "r1").await.unwrap().unwrap();
        let second = allocate_code(db.pool(), "r1").await.unwrap().unwrap();
        assert_ne!(first.code, second.code);
        assert!(first.assigned && second.assigned);

        // Pool exhausted
        assert!(allocate_code(db.pool(), "r1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_returns_code_to_pool() {
        let db = setup().await;
        seed_codes(db.pool(), "r1", &["AAA".to_string()]).await.unwrap();

        let code = allocate_code(db.pool(), "r1").await.unwrap().unwrap();
        assert!(allocate_code(db.pool(), "r1").await.unwrap().is_none());

        assert!(release_code(db.pool(), code.id).await.unwrap());
        let again = allocate_code(db.pool(), "r1").await.unwrap().unwrap();
        assert_eq!(again.code, "AAA");
    }

    #[tokio::test]
    async fn test_empty_pool_allocates_nothing() {
        let db = Database::connect_in_memory().await.unwrap();
        assert!(allocate_code(db.pool(), "r1").await.unwrap().is_none());
    }
}
