//! Record Store: persistence for monitored site records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pulse_core::{SiteRecord, SiteStatus};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::RwLock;

pub const CRATE_NAME: &str = "pulse-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid status {0:?} in stored record")]
    InvalidStatus(String),
}

/// The only shared mutable state in the system. `put` is an atomic
/// full-record upsert; there are no cross-record guarantees.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<SiteRecord>, StoreError>;
    async fn scan(&self) -> Result<Vec<SiteRecord>, StoreError>;
    async fn put(&self, record: &SiteRecord) -> Result<(), StoreError>;
    /// Returns true when a record was actually removed.
    async fn delete(&self, url: &str) -> Result<bool, StoreError>;
}

/// Postgres-backed store. One row per site; `example_posts` and `history`
/// live in jsonb columns so the upsert stays a single statement.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // Safe to run on every boot
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        const DDL: &str = r#"
        CREATE TABLE IF NOT EXISTS sites (
          url             text PRIMARY KEY,
          keyword         text NOT NULL,
          owner_id        text NOT NULL,
          owner_email     text,
          status          text NOT NULL,
          sentiment_score double precision NOT NULL DEFAULT 0.0,
          example_posts   jsonb NOT NULL DEFAULT '[]'::jsonb,
          history         jsonb NOT NULL DEFAULT '[]'::jsonb,
          created_at      timestamptz NOT NULL,
          updated_at      timestamptz NOT NULL
        );
        "#;
        sqlx::raw_sql(DDL).execute(&self.pool).await?;
        Ok(())
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<SiteRecord, StoreError> {
        let status_text: String = row.try_get("status")?;
        let status = SiteStatus::parse(&status_text)
            .ok_or_else(|| StoreError::InvalidStatus(status_text))?;
        let example_posts: serde_json::Value = row.try_get("example_posts")?;
        let history: serde_json::Value = row.try_get("history")?;
        Ok(SiteRecord {
            url: row.try_get("url")?,
            keyword: row.try_get("keyword")?,
            owner_id: row.try_get("owner_id")?,
            owner_email: row.try_get("owner_email")?,
            status,
            sentiment_score: row.try_get("sentiment_score")?,
            example_posts: serde_json::from_value(example_posts)?,
            history: serde_json::from_value(history)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, url: &str) -> Result<Option<SiteRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT url, keyword, owner_id, owner_email, status, sentiment_score,
                   example_posts, history, created_at, updated_at
              FROM sites
             WHERE url = $1
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn scan(&self) -> Result<Vec<SiteRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT url, keyword, owner_id, owner_email, status, sentiment_score,
                   example_posts, history, created_at, updated_at
              FROM sites
             ORDER BY url
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::record_from_row).collect()
    }

    async fn put(&self, record: &SiteRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sites
              (url, keyword, owner_id, owner_email, status, sentiment_score,
               example_posts, history, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (url) DO UPDATE
              SET keyword         = EXCLUDED.keyword,
                  owner_id        = EXCLUDED.owner_id,
                  owner_email     = EXCLUDED.owner_email,
                  status          = EXCLUDED.status,
                  sentiment_score = EXCLUDED.sentiment_score,
                  example_posts   = EXCLUDED.example_posts,
                  history         = EXCLUDED.history,
                  updated_at      = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.url)
        .bind(&record.keyword)
        .bind(&record.owner_id)
        .bind(&record.owner_email)
        .bind(record.status.as_str())
        .bind(record.sentiment_score)
        .bind(serde_json::to_value(&record.example_posts)?)
        .bind(serde_json::to_value(&record.history)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sites WHERE url = $1")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store for tests and local runs. Scan order matches the
/// Postgres store (by url).
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<String, SiteRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, url: &str) -> Result<Option<SiteRecord>, StoreError> {
        Ok(self.records.read().await.get(url).cloned())
    }

    async fn scan(&self) -> Result<Vec<SiteRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn put(&self, record: &SiteRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.url.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(url).is_some())
    }
}
