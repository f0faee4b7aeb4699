//! # Backend contracts
//!
//! This module defines the seams between the payment engine and the outside world.
//!
//! ## Storage
//! Every piece of engine state (orders, provider reference indices, phone indices, subscriptions and monitor counters)
//! lives in a single key-value namespace. The [`KeyValueStore`] trait captures the small set of primitives the engine
//! needs from that store: per-key TTLs, atomic create-if-absent, versioned compare-and-set, atomic counters and prefix
//! scans. Any backend that can offer these atomically can host the gateway. Two are provided: an in-process
//! [`crate::MemoryStore`] and the SQLite-backed [`crate::SqliteStore`].
//!
//! ## Alerting
//! The [`AlertNotifier`] trait is how the health monitor reaches operators.
mod alert_notifier;
mod key_value_store;

pub use alert_notifier::{Alert, AlertNotifier, NotifierError};
pub use key_value_store::{Expiry, KeyValueStore, StoreError, StoredValue};
