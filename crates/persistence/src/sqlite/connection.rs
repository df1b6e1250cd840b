//! Database connection and initialization

use geodrop_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Database wrapper for SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to database at the given path, creating if necessary
    pub async fn connect(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::DatabaseError(e.to_string()))?;
        }

        let path_str = path.to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(|e| Error::DatabaseError(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect to in-memory database (for testing)
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'player',
                partner_id TEXT,
                points_total INTEGER NOT NULL DEFAULT 0,
                points_available INTEGER NOT NULL DEFAULT 0,
                points_spent INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(username)
            );

            CREATE TABLE IF NOT EXISTS rewards (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                partner_id TEXT NOT NULL,
                city TEXT,
                cost_points INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1,
                has_code_pool INTEGER NOT NULL DEFAULT 0,
                stock_quantity INTEGER NOT NULL,
                stock_available INTEGER NOT NULL,
                stock_reserved INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS redemptions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                reward_id TEXT NOT NULL,
                points_spent INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                code_id INTEGER,
                idempotency_key TEXT NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                fulfilled_at TIMESTAMP,
                UNIQUE(idempotency_key),
                FOREIGN KEY (user_id) REFERENCES users(id),
                FOREIGN KEY (reward_id) REFERENCES rewards(id)
            );

            CREATE TABLE IF NOT EXISTS fulfillment_codes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reward_id TEXT NOT NULL,
                code TEXT NOT NULL,
                assigned INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (reward_id) REFERENCES rewards(id)
            );

            CREATE INDEX IF NOT EXISTS idx_redemptions_user
                ON redemptions (user_id, created_at);

            CREATE INDEX IF NOT EXISTS idx_codes_reward_unassigned
                ON fulfillment_codes (reward_id)
                WHERE assigned = 0;
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
