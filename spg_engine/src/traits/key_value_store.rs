use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("The key-value store is unavailable. {0}")]
    Unavailable(String),
    #[error("The key-value store did not respond within {0:?}")]
    Timeout(Duration),
    #[error("The record stored under {key} could not be decoded. {reason}")]
    CorruptRecord { key: String, reason: String },
    #[error("Could not serialize a record for {key}. {reason}")]
    Serialization { key: String, reason: String },
}

/// How a write treats the time-to-live of the key it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The key lives until it is deleted.
    Never,
    /// The key is evicted once the duration has passed, measured from the write.
    After(Duration),
    /// Keep whatever TTL the key currently has. Writes that create a key with `Keep` create it without a TTL.
    Keep,
}

/// A value together with the version it was read at. Every successful write bumps the version, so a version can be
/// handed back to [`KeyValueStore::compare_and_set`] to detect concurrent modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub version: u64,
}

/// The storage primitives the engine is built on.
///
/// Expired keys are invisible to every operation: reads return `None`, `set_if_absent` treats them as absent,
/// and `compare_and_set` never matches them. All operations are atomic with respect to each other for a single key.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore: Clone {
    /// Fetches the live value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;

    /// Unconditionally writes `value` under `key`.
    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError>;

    /// Writes `value` only if no live value exists under `key`. Returns true if the write happened.
    async fn set_if_absent(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError>;

    /// Replaces the value under `key` only if it is still at `expected_version`. Returns true if the write happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: u64,
        value: &str,
        expiry: Expiry,
    ) -> Result<bool, StoreError>;

    /// Removes `key`. Returns true if a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Atomically adds one to the integer stored under `key` and returns the new value. A missing key counts from
    /// zero and takes `expiry_on_create`; an existing key keeps its TTL.
    async fn increment(&self, key: &str, expiry_on_create: Expiry) -> Result<i64, StoreError>;

    /// Returns every live entry whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredValue)>, StoreError>;
}
