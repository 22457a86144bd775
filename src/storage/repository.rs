use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::MIGRATION_001_INITIAL;

/// Metadata about a stored slot.
#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub key: String,
    pub size: i64,
    pub updated_at: DateTime<Utc>,
}

/// SQLite-backed key-value store holding serialized ledger documents.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run on every start.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Open (creating if needed) the database file at `path` and migrate it.
    pub async fn init(path: &str) -> Result<Self> {
        let repo = Self::connect(&format!("sqlite:{}?mode=rwc", path)).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Read the raw document stored under `key`.
    pub async fn load_slot(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read slot")?;

        Ok(row.map(|row| row.get("value")))
    }

    /// Store a raw document under `key`, replacing any previous value.
    pub async fn save_slot(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slots (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to write slot")?;
        Ok(())
    }

    /// List stored slots, ordered by key.
    pub async fn list_slots(&self) -> Result<Vec<SlotInfo>> {
        let rows = sqlx::query(
            "SELECT key, LENGTH(value) AS size, updated_at FROM slots ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list slots")?;

        rows.iter()
            .map(|row| {
                let updated_at: String = row.get("updated_at");
                Ok(SlotInfo {
                    key: row.get("key"),
                    size: row.get("size"),
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .context("Invalid updated_at timestamp")?
                        .with_timezone(&Utc),
                })
            })
            .collect()
    }
}
