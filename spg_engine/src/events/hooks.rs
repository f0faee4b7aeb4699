use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderDeclinedEvent, SubscriptionActivatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub subscription_activated_producer: Vec<EventProducer<SubscriptionActivatedEvent>>,
    pub order_declined_producer: Vec<EventProducer<OrderDeclinedEvent>>,
}

pub struct EventHandlers {
    pub on_subscription_activated: Option<EventHandler<SubscriptionActivatedEvent>>,
    pub on_order_declined: Option<EventHandler<OrderDeclinedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_subscription_activated = hooks.on_subscription_activated.map(|f| EventHandler::new(buffer_size, f));
        let on_order_declined = hooks.on_order_declined.map(|f| EventHandler::new(buffer_size, f));
        Self { on_subscription_activated, on_order_declined }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_subscription_activated {
            result.subscription_activated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_declined {
            result.order_declined_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_subscription_activated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_declined {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_subscription_activated: Option<Handler<SubscriptionActivatedEvent>>,
    pub on_order_declined: Option<Handler<OrderDeclinedEvent>>,
}

impl EventHooks {
    pub fn on_subscription_activated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SubscriptionActivatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_subscription_activated = Some(Arc::new(f));
        self
    }

    pub fn on_order_declined<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDeclinedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_declined = Some(Arc::new(f));
        self
    }
}
