use serde::{Deserialize, Serialize};

use crate::db_types::{Order, UserSubscription};

/// Published once per order, by the call that won the pending → completed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionActivatedEvent {
    pub order: Order,
    pub subscription: UserSubscription,
}

impl SubscriptionActivatedEvent {
    pub fn new(order: Order, subscription: UserSubscription) -> Self {
        Self { order, subscription }
    }
}

/// Published when a rail reports a declined payment and the order moves to `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeclinedEvent {
    pub order: Order,
    pub reason: String,
}

impl OrderDeclinedEvent {
    pub fn new(order: Order, reason: &str) -> Self {
        Self { order, reason: reason.to_string() }
    }
}
