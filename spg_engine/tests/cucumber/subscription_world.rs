use std::{collections::HashMap, fmt::Debug};

use chrono::{DateTime, Utc};
use cucumber::World;
use spg_engine::{
    db_types::{Order, UserId},
    spg_api::webhook_objects::IngestOutcome,
    MemoryStore,
};

use crate::support::{gateway, Gateway};

#[derive(Default, World)]
pub struct SubscriptionWorld {
    pub system: Option<Gateway<MemoryStore>>,
    pub order: Option<Order>,
    pub last_callback: Option<IngestOutcome>,
    pub last_error: Option<String>,
    pub noted_expiries: HashMap<UserId, DateTime<Utc>>,
}

impl Debug for SubscriptionWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionWorld")
            .field("order", &self.order)
            .field("last_callback", &self.last_callback)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl SubscriptionWorld {
    pub fn start(&mut self) {
        self.system = Some(gateway(MemoryStore::new()));
    }

    pub fn gateway(&self) -> &Gateway<MemoryStore> {
        self.system.as_ref().expect("Gateway not initialised. Start with 'Given a fresh gateway'")
    }

    pub fn order(&self) -> &Order {
        self.order.as_ref().expect("No order has been placed in this scenario")
    }
}
