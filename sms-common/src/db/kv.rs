//! SQLite-backed local store

use super::init::init_database;
use super::local_store::{entry_size, LocalStore, LocalStoreError};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Local store persisted in the `kv_store` table
#[derive(Debug, Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
    capacity: usize,
    /// Serializes the quota check and the write of each `set`
    write_lock: Arc<Mutex<()>>,
}

impl SqliteLocalStore {
    /// Wrap an initialized pool (see [`init_database`])
    pub fn new(pool: SqlitePool, capacity: usize) -> Self {
        Self {
            pool,
            capacity,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open (creating if needed) the store at `db_path`
    pub async fn open(db_path: &Path, capacity: usize) -> crate::Result<Self> {
        let pool = init_database(db_path).await?;
        Ok(Self::new(pool, capacity))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total bytes stored (keys + values)
    pub async fn used_bytes(&self) -> Result<usize, LocalStoreError> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(used.max(0) as usize)
    }

    async fn used_bytes_excluding(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
    ) -> Result<usize, LocalStoreError> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM kv_store WHERE key != ?",
        )
        .bind(key)
        .fetch_one(&mut **tx)
        .await?;
        Ok(used.max(0) as usize)
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        // SQLite cannot upgrade two concurrent readers to writers, so sets
        // through this handle queue here before opening their transaction
        let _write = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let required = Self::used_bytes_excluding(&mut tx, key).await? + entry_size(key, value);
        if required > self.capacity {
            return Err(LocalStoreError::QuotaExceeded {
                required,
                capacity: self.capacity,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(key = %key, bytes = value.len(), "Persisted local key");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
