//! `SqliteStore` is the durable [`KeyValueStore`] backend for the payment gateway.
//!
//! Every operation runs on a pooled connection and is bounded by the configured store timeout. A call that does not
//! finish in time fails with [`StoreError::Timeout`] rather than hanging the request that issued it.
use std::{fmt::Debug, future::Future, time::Duration};

use chrono::Utc;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{db_url, kv, new_pool};
use crate::traits::{Expiry, KeyValueStore, StoreError, StoredValue};

#[derive(Clone)]
pub struct SqliteStore {
    url: String,
    pool: SqlitePool,
    timeout: Duration,
}

impl Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteStore ({:?}, timeout {:?})", self.pool, self.timeout)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<MigrateError> for StoreError {
    fn from(e: MigrateError) -> Self {
        StoreError::Unavailable(format!("Could not migrate the database. {e}"))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Splits an [`Expiry`] into the absolute expiry to write and whether an existing TTL should be kept.
fn expiry_params(expiry: Expiry, now: i64) -> (Option<i64>, bool) {
    match expiry {
        Expiry::Never => (None, false),
        Expiry::After(ttl) => {
            let ttl = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
            (Some(now.saturating_add(ttl)), false)
        },
        Expiry::Keep => (None, true),
    }
}

impl SqliteStore {
    /// Connects to the database named by `SPG_DATABASE_URL` and brings its schema up to date.
    pub async fn new(max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        let url = db_url();
        SqliteStore::new_with_url(&url, max_connections, timeout).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32, timeout: Duration) -> Result<Self, StoreError> {
        let pool = new_pool(url, max_connections, timeout).await?;
        sqlx::migrate!("./src/sqlite/migrations").run(&pool).await?;
        debug!("🗃️ SQLite store at {url} is ready");
        Ok(Self { url: url.to_string(), pool, timeout })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }

    /// Deletes every expired row. Expired rows are already invisible, this only reclaims space.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let removed = self
            .bounded(async {
                let mut conn = self.pool.acquire().await?;
                kv::purge_expired(now_millis(), &mut conn).await
            })
            .await?;
        if removed > 0 {
            debug!("🗃️ Purged {removed} expired entries");
        }
        Ok(removed)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where F: Future<Output = Result<T, sqlx::Error>> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => {
                warn!("🗃️ Store operation timed out after {:?}", self.timeout);
                Err(StoreError::Timeout(self.timeout))
            },
        }
    }
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            kv::fetch(key, now_millis(), &mut conn).await
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            let now = now_millis();
            let (expires_at, keep_ttl) = expiry_params(expiry, now);
            kv::upsert(key, value, expires_at, keep_ttl, now, &mut conn).await
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            let now = now_millis();
            let (expires_at, _) = expiry_params(expiry, now);
            kv::insert_if_absent(key, value, expires_at, now, &mut conn).await
        })
        .await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: u64,
        value: &str,
        expiry: Expiry,
    ) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            let now = now_millis();
            let (expires_at, keep_ttl) = expiry_params(expiry, now);
            kv::compare_and_set(key, expected_version, value, expires_at, keep_ttl, now, &mut conn).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            kv::delete(key, now_millis(), &mut conn).await
        })
        .await
    }

    async fn increment(&self, key: &str, expiry_on_create: Expiry) -> Result<i64, StoreError> {
        let value = self
            .bounded(async {
                let mut conn = self.pool.acquire().await?;
                let now = now_millis();
                let (expires_at, _) = expiry_params(expiry_on_create, now);
                kv::increment(key, expires_at, now, &mut conn).await
            })
            .await?;
        value.parse::<i64>().map_err(|e| StoreError::CorruptRecord {
            key: key.to_string(),
            reason: format!("Counter value '{value}' is not an integer. {e}"),
        })
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredValue)>, StoreError> {
        self.bounded(async {
            let mut conn = self.pool.acquire().await?;
            kv::scan_prefix(prefix, now_millis(), &mut conn).await
        })
        .await
    }
}
