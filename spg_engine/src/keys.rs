//! Key layout for everything the gateway keeps in the key-value store.
//!
//! | Key                                   | Value                 | Lifetime                        |
//! |---------------------------------------|-----------------------|---------------------------------|
//! | `order:<orderId>`                     | order JSON            | order TTL, then retention       |
//! | `ref:<RAIL>:<providerRef>`            | order id              | same as the order               |
//! | `phone:<msisdn>`                      | order id              | order TTL                       |
//! | `user:<userId>`                       | subscription JSON     | none                            |
//! | `monitor:mapping_misses:<YYYY-MM-DD>` | counter               | 3 days                          |
//! | `monitor:alert_sent:<condition>`      | timestamp             | alert throttle window           |
//!
//! All keys can be placed under a common namespace, e.g. `staging:order:<orderId>`.
use chrono::NaiveDate;

use crate::{
    db_types::{OrderId, PaymentMethod, UserId},
    spg_api::monitor_objects::AlertCondition,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    namespace: Option<String>,
}

impl KeySchema {
    pub fn new(namespace: Option<String>) -> Self {
        let namespace = namespace.map(|ns| ns.trim().trim_end_matches(':').to_string()).filter(|ns| !ns.is_empty());
        Self { namespace }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn key(&self, body: String) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}:{body}"),
            None => body,
        }
    }

    pub fn order(&self, order_id: &OrderId) -> String {
        self.key(format!("order:{order_id}"))
    }

    pub fn order_prefix(&self) -> String {
        self.key("order:".to_string())
    }

    /// Recovers the order id from an order key produced by this schema.
    pub fn order_id_from_key(&self, key: &str) -> Option<OrderId> {
        key.strip_prefix(&self.order_prefix()).filter(|id| !id.is_empty()).map(OrderId::from)
    }

    pub fn provider_ref(&self, rail: PaymentMethod, provider_ref: &str) -> String {
        self.key(format!("ref:{}:{provider_ref}", rail.as_str()))
    }

    pub fn provider_ref_prefix(&self) -> String {
        self.key("ref:".to_string())
    }

    pub fn phone(&self, normalized_phone: &str) -> String {
        self.key(format!("phone:{normalized_phone}"))
    }

    pub fn user(&self, user_id: UserId) -> String {
        self.key(format!("user:{user_id}"))
    }

    pub fn mapping_misses(&self, date: NaiveDate) -> String {
        self.key(format!("monitor:mapping_misses:{}", date.format("%Y-%m-%d")))
    }

    pub fn alert_sent(&self, condition: AlertCondition) -> String {
        self.key(format!("monitor:alert_sent:{}", condition.as_str()))
    }
}
