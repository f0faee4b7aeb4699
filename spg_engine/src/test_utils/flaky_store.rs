use std::sync::Arc;

use log::*;
use parking_lot::Mutex;

use crate::traits::{Expiry, KeyValueStore, StoreError, StoredValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    Writes,
    Everything,
}

/// Wraps another store and makes chosen key prefixes unavailable.
///
/// Every call also yields to the scheduler before it reaches the inner store, so concurrent tasks driven by
/// `join_all` interleave at each store round trip the way they would against a networked store.
#[derive(Debug, Clone)]
pub struct FlakyStore<S> {
    inner: S,
    rules: Arc<Mutex<Vec<(String, FailureMode)>>>,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, rules: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Writes to keys starting with `prefix` fail with [`StoreError::Unavailable`]. Reads still work.
    pub fn fail_writes_to(&self, prefix: &str) {
        self.rules.lock().push((prefix.to_string(), FailureMode::Writes));
    }

    /// Every operation touching keys that start with `prefix` fails.
    pub fn fail_everything_on(&self, prefix: &str) {
        self.rules.lock().push((prefix.to_string(), FailureMode::Everything));
    }

    pub fn heal(&self) {
        self.rules.lock().clear();
    }

    async fn check(&self, key: &str, is_write: bool) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let blocked = self
            .rules
            .lock()
            .iter()
            .any(|(prefix, mode)| key.starts_with(prefix.as_str()) && (is_write || *mode == FailureMode::Everything));
        if blocked {
            debug!("🗃️ Injected failure on {key}");
            return Err(StoreError::Unavailable(format!("Injected failure on {key}")));
        }
        Ok(())
    }
}

impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        self.check(key, false).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError> {
        self.check(key, true).await?;
        self.inner.set(key, value, expiry).await
    }

    async fn set_if_absent(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError> {
        self.check(key, true).await?;
        self.inner.set_if_absent(key, value, expiry).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: u64,
        value: &str,
        expiry: Expiry,
    ) -> Result<bool, StoreError> {
        self.check(key, true).await?;
        self.inner.compare_and_set(key, expected_version, value, expiry).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check(key, true).await?;
        self.inner.delete(key).await
    }

    async fn increment(&self, key: &str, expiry_on_create: Expiry) -> Result<i64, StoreError> {
        self.check(key, true).await?;
        self.inner.increment(key, expiry_on_create).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredValue)>, StoreError> {
        self.check(prefix, false).await?;
        self.inner.scan_prefix(prefix).await
    }
}
