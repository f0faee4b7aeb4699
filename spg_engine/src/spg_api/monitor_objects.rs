use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{OrderId, Tier, UserId},
    spg_api::order_objects::PendingOrderSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    StalePendingOrders,
    MappingMissSpike,
    SubscriptionNotExtended,
}

impl AlertCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCondition::StalePendingOrders => "stale_pending_orders",
            AlertCondition::MappingMissSpike => "mapping_miss_spike",
            AlertCondition::SubscriptionNotExtended => "subscription_not_extended",
        }
    }
}

impl Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pending orders older than this are reported as stale. Should be shorter than the order TTL.
    pub stale_after: chrono::Duration,
    /// Number of stale orders that raises an alert.
    pub stale_alert_threshold: usize,
    /// Daily mapping misses at or above which a spike alert is considered.
    pub mapping_miss_threshold: i64,
    /// An alert for the same condition is sent at most once per window.
    pub alert_throttle: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::minutes(10),
            stale_alert_threshold: 1,
            mapping_miss_threshold: 5,
            alert_throttle: Duration::from_secs(3600),
        }
    }
}

/// A completed order whose user record does not grant what the order paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnextendedSubscription {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub tier: Tier,
    pub completed_at: Option<DateTime<Utc>>,
    pub expected_expiry: Option<DateTime<Utc>>,
    pub current_expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorReport {
    pub run_at: DateTime<Utc>,
    pub stale_orders: Vec<PendingOrderSummary>,
    pub misses_today: i64,
    pub misses_yesterday: i64,
    pub unextended_subscriptions: Vec<UnextendedSubscription>,
    pub alerts_sent: Vec<AlertCondition>,
    pub alerts_throttled: Vec<AlertCondition>,
    pub alerts_failed: Vec<AlertCondition>,
}

impl MonitorReport {
    pub fn is_healthy(&self) -> bool {
        self.stale_orders.is_empty() && self.unextended_subscriptions.is_empty() && self.alerts_sent.is_empty()
    }
}
