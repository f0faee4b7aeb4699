//! An in-process [`KeyValueStore`].
//!
//! Used for tests and single-node deployments where losing state on restart is acceptable. Expired entries are
//! evicted lazily when they are touched, or in bulk via [`MemoryStore::purge_expired`].
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use log::*;
use parking_lot::Mutex;

use crate::traits::{Expiry, KeyValueStore, StoreError, StoredValue};

#[derive(Debug)]
struct Entry {
    value: String,
    version: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }

    fn stored_value(&self) -> StoredValue {
        StoredValue { value: self.value.clone(), version: self.version }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    // Versions are drawn from a store-wide counter so that a key which expires and is recreated never reuses a
    // version a stale reader might still hold.
    last_version: u64,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        let expired = self.entries.get(key).map(|e| !e.is_live(now)).unwrap_or(false);
        if expired {
            trace!("🗃️ Evicting expired key {key}");
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn write(&mut self, key: &str, value: &str, expiry: Expiry, now: Instant) {
        let version = self.next_version();
        let current_expiry = self.live(key, now).and_then(|e| e.expires_at);
        let expires_at = match expiry {
            Expiry::Never => None,
            Expiry::After(ttl) => Some(now + ttl),
            Expiry::Keep => current_expiry,
        };
        self.entries.insert(key.to_string(), Entry { value: value.to_string(), version, expires_at });
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry. Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, e| e.is_live(now));
        before - state.entries.len()
    }

    /// The time left before `key` expires. `None` if the key is missing or has no TTL.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.live(key, now).and_then(|e| e.expires_at).map(|at| at.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.state.lock().entries.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let mut state = self.state.lock();
        Ok(state.live(key, Instant::now()).map(|e| e.stored_value()))
    }

    async fn set(&self, key: &str, value: &str, expiry: Expiry) -> Result<(), StoreError> {
        self.state.lock().write(key, value, expiry, Instant::now());
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, expiry: Expiry) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.live(key, now).is_some() {
            return Ok(false);
        }
        state.write(key, value, expiry, now);
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected_version: u64,
        value: &str,
        expiry: Expiry,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let current = state.live(key, now).map(|e| e.version == expected_version).unwrap_or(false);
        if !current {
            return Ok(false);
        }
        state.write(key, value, expiry, now);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let existed = state.live(key, now).is_some();
        state.entries.remove(key);
        Ok(existed)
    }

    async fn increment(&self, key: &str, expiry_on_create: Expiry) -> Result<i64, StoreError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let current = match state.live(key, now) {
            Some(entry) => entry.value.parse::<i64>().map_err(|e| StoreError::CorruptRecord {
                key: key.to_string(),
                reason: format!("Counter value '{}' is not an integer. {e}", entry.value),
            })?,
            None => 0,
        };
        let next = current + 1;
        let expiry = if current == 0 { expiry_on_create } else { Expiry::Keep };
        state.write(key, &next.to_string(), expiry, now);
        Ok(next)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, StoredValue)>, StoreError> {
        let now = Instant::now();
        let state = self.state.lock();
        let mut result = state
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && e.is_live(now))
            .map(|(k, e)| (k.clone(), e.stored_value()))
            .collect::<Vec<_>>();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(result)
    }
}
