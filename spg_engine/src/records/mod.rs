//! # Typed records over the key-value store
//!
//! The engine never touches raw keys or JSON outside this module. Like the SQLite helpers, these are plain functions
//! that take the store and key schema as arguments, so any caller holding a [`KeyValueStore`] can use them.
//!
//! [`KeyValueStore`]: crate::traits::KeyValueStore
use serde::{de::DeserializeOwned, Serialize};

use crate::traits::{StoreError, StoredValue};

pub mod counters;
pub mod indices;
pub mod orders;
pub mod subscriptions;

pub(crate) fn encode<T: Serialize>(key: &str, record: &T) -> Result<String, StoreError> {
    serde_json::to_string(record).map_err(|e| StoreError::Serialization { key: key.to_string(), reason: e.to_string() })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, stored: &StoredValue) -> Result<T, StoreError> {
    serde_json::from_str(&stored.value)
        .map_err(|e| StoreError::CorruptRecord { key: key.to_string(), reason: e.to_string() })
}
