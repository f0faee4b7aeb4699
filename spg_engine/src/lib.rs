//! Subscription Payment Gateway engine
//!
//! The engine sells time-limited subscriptions over several payment rails (mobile money till, crypto invoice, hosted
//! card checkout and exchange pay orders) and activates each paid order exactly once, however many times, and by
//! whichever path, the payment is reported.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@traits`], [`mod@records`], [`mod@keys`]). All state lives in a key-value store with per-key
//!    expiry and conditional writes. [`MemoryStore`] and [`SqliteStore`] are the two supplied backends. Every key the
//!    engine uses is built by [`keys::KeySchema`], and typed access goes through the functions in [`mod@records`].
//! 2. Payment rails ([`mod@providers`], [`mod@webhooks`], [`mod@pricing`]). Adapters open payments with each provider;
//!    the webhook module verifies and normalises what providers send back.
//! 3. The public API ([`mod@spg_api`]): order creation, webhook ingest, activation and repair, and the health monitor.
//!
//! Activations and declines are published as events (see [`mod@events`]) so that other components, such as the chat
//! layer that tells users their subscription is live, can react to them.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod keys;
mod memory_store;
pub mod notifiers;
pub mod pricing;
pub mod providers;
pub mod records;
pub mod spg_api;
pub mod traits;
pub mod webhooks;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use memory_store::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use spg_api::{
    activation_api::ActivationApi,
    errors::{ActivationError, MonitorError, OrderFlowError, ValidationError},
    monitor_api::HealthMonitor,
    order_flow_api::OrderFlowApi,
    order_objects,
    webhook_api::WebhookApi,
};
