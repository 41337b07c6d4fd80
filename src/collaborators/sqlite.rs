//! SQLite-backed ledger and relationship store.

use super::traits::{Ledger, RelationshipStore, normalize_ledger_key};
use super::types::{LedgerMetadata, Relationship};
use crate::error::CollaboratorError;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

const STATE_CLAIMED: &str = "claimed";
const STATE_PROCESSED: &str = "processed";

/// Open (creating if needed) the database file and apply the schema.
pub async fn open_pool(db_path: &Path) -> anyhow::Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("create ledger directory")?;
    }

    let url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = SqlitePool::connect(&url)
        .await
        .context("open SQLite database")?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every pooled connection would
/// otherwise see its own empty database.
pub async fn open_in_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .context("open in-memory SQLite")?;
    init_schema(&pool).await?;
    Ok(pool)
}

async fn init_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS ledger (
            collection  TEXT NOT NULL,
            key         TEXT NOT NULL,
            state       TEXT NOT NULL,
            company     TEXT,
            document_id TEXT,
            folder_id   TEXT,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        CREATE TABLE IF NOT EXISTS relationships (
            key        TEXT PRIMARY KEY,
            record     TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
    .execute(pool)
    .await
    .map_err(|e| CollaboratorError::Sqlx(e.to_string()))
    .context("initialize ledger schema")?;
    Ok(())
}

// ── Ledger ───────────────────────────────────────────────────────

pub struct SqliteLedger {
    pool: SqlitePool,
    collection: String,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    pub async fn metadata(&self, key: &str) -> anyhow::Result<Option<LedgerMetadata>> {
        let row: Option<(Option<String>, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT company, document_id, folder_id FROM ledger
             WHERE collection = ?1 AND key = ?2 AND state = ?3",
        )
        .bind(&self.collection)
        .bind(normalize_ledger_key(key))
        .bind(STATE_PROCESSED)
        .fetch_optional(&self.pool)
        .await
        .context("read ledger metadata")?;

        Ok(row.map(|(company, document_id, folder_id)| LedgerMetadata {
            company: company.unwrap_or_default(),
            document_id,
            folder_id,
        }))
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn is_processed(&self, key: &str) -> anyhow::Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ledger WHERE collection = ?1 AND key = ?2 AND state = ?3",
        )
        .bind(&self.collection)
        .bind(normalize_ledger_key(key))
        .bind(STATE_PROCESSED)
        .fetch_one(&self.pool)
        .await
        .context("check ledger entry")?;
        Ok(count > 0)
    }

    async fn try_claim(&self, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO ledger (collection, key, state, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&self.collection)
        .bind(normalize_ledger_key(key))
        .bind(STATE_CLAIMED)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("claim ledger entry")?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_processed(&self, key: &str, metadata: &LedgerMetadata) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO ledger (collection, key, state, company, document_id, folder_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (collection, key) DO UPDATE SET
                state = excluded.state,
                company = excluded.company,
                document_id = excluded.document_id,
                folder_id = excluded.folder_id,
                updated_at = excluded.updated_at",
        )
        .bind(&self.collection)
        .bind(normalize_ledger_key(key))
        .bind(STATE_PROCESSED)
        .bind(&metadata.company)
        .bind(metadata.document_id.as_deref())
        .bind(metadata.folder_id.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("mark ledger entry processed")?;
        Ok(())
    }

    async fn release(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM ledger WHERE collection = ?1 AND key = ?2 AND state = ?3")
            .bind(&self.collection)
            .bind(normalize_ledger_key(key))
            .bind(STATE_CLAIMED)
            .execute(&self.pool)
            .await
            .context("release ledger claim")?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM ledger WHERE collection = ?1 AND key = ?2")
            .bind(&self.collection)
            .bind(normalize_ledger_key(key))
            .execute(&self.pool)
            .await
            .context("clear ledger entry")?;
        Ok(result.rows_affected() > 0)
    }

    async fn probe(&self) -> anyhow::Result<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("ledger probe")?;
        Ok(())
    }
}

// ── Relationships ────────────────────────────────────────────────

pub struct SqliteRelationshipStore {
    pool: SqlitePool,
}

impl SqliteRelationshipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RelationshipStore for SqliteRelationshipStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Relationship>> {
        let record: Option<String> =
            sqlx::query_scalar("SELECT record FROM relationships WHERE key = ?1")
                .bind(normalize_ledger_key(key))
                .fetch_optional(&self.pool)
                .await
                .context("read relationship")?;

        record
            .map(|json| {
                serde_json::from_str::<Relationship>(&json).map_err(|e| {
                    anyhow::Error::from(CollaboratorError::Malformed {
                        collaborator: "relationships",
                        message: e.to_string(),
                    })
                })
            })
            .transpose()
    }

    async fn upsert(&self, relationship: &Relationship) -> anyhow::Result<()> {
        let record = serde_json::to_string(relationship).context("encode relationship")?;
        sqlx::query(
            "INSERT INTO relationships (key, record, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET record = excluded.record, updated_at = excluded.updated_at",
        )
        .bind(normalize_ledger_key(&relationship.key))
        .bind(record)
        .bind(relationship.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("upsert relationship")?;
        Ok(())
    }
}
