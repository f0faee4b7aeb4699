use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, UserId, UserSubscription},
    events::{EventProducers, OrderDeclinedEvent, SubscriptionActivatedEvent},
    keys::KeySchema,
    records::{
        indices,
        orders::{self, VersionedOrder},
        subscriptions,
    },
    spg_api::{
        errors::ActivationError,
        order_objects::{ActivationOutcome, ActivationResult, DeclineOutcome, RepairResult},
    },
    traits::{Expiry, KeyValueStore, StoreError},
};

/// How long completed orders and their reference index stay resolvable after completion.
pub const DEFAULT_COMPLETED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// Conditional writes that keep losing are retried this many times before giving up with `Contention`.
const MAX_TRANSITION_ATTEMPTS: usize = 5;

/// `ActivationApi` owns every state transition an order makes after creation, and is the only component that writes
/// user subscription records.
///
/// Transitions are conditional writes against the order's store version, so any number of callers (duplicate webhook
/// deliveries, an operator override) can race on the same order without external locking. Exactly one of them wins
/// the `pending → completed` transition and extends the subscription; the others observe the completed order and
/// report [`ActivationOutcome::AlreadyCompleted`].
#[derive(Clone)]
pub struct ActivationApi<S> {
    store: S,
    keys: KeySchema,
    completed_retention: Duration,
    producers: EventProducers,
}

impl<S> Debug for ActivationApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActivationApi (retention {:?})", self.completed_retention)
    }
}

impl<S> ActivationApi<S> {
    pub fn new(store: S, keys: KeySchema, producers: EventProducers) -> Self {
        Self { store, keys, completed_retention: DEFAULT_COMPLETED_RETENTION, producers }
    }

    pub fn with_completed_retention(mut self, retention: Duration) -> Self {
        self.completed_retention = retention;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }
}

impl<S> ActivationApi<S>
where S: KeyValueStore
{
    /// Completes the order and extends the user's subscription, exactly once per order.
    ///
    /// If the order is already completed, nothing is written and the original transaction reference and completion
    /// time are returned. A missing or lapsed order is [`ActivationError::OrderNotFound`]; a failed one is
    /// [`ActivationError::NotActivatable`].
    pub async fn activate(
        &self,
        order_id: &OrderId,
        transaction_ref: &str,
    ) -> Result<ActivationResult, ActivationError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let now = Utc::now();
            let current = self.load_live(order_id).await?;
            match current.order.effective_status(now) {
                OrderStatusType::Pending => {},
                OrderStatusType::Completed => {
                    debug!(
                        "✅️ Order {order_id} was already completed with transaction {}. Ignoring transaction \
                         {transaction_ref}.",
                        current.order.transaction_ref.as_deref().unwrap_or("<none>")
                    );
                    return Ok(ActivationResult::new(ActivationOutcome::AlreadyCompleted, &current.order));
                },
                status => {
                    return Err(ActivationError::NotActivatable { order_id: order_id.clone(), status });
                },
            }
            let completed = current.order.clone().into_completed(transaction_ref, now);
            let retention = Expiry::After(self.completed_retention);
            if !orders::compare_and_swap_order(&self.store, &self.keys, &current, &completed, retention).await? {
                debug!("✅️ Order {order_id} changed while being activated (attempt {attempt}). Re-reading.");
                tokio::task::yield_now().await;
                continue;
            }
            info!("✅️ Order {order_id} completed with transaction {transaction_ref}");
            self.rearm_reference(&completed).await;
            let subscription = self.extend_subscription(&completed).await?;
            self.publish_activation(&completed, subscription).await;
            return Ok(ActivationResult::new(ActivationOutcome::Activated, &completed));
        }
        warn!("✅️ Gave up activating order {order_id} after {MAX_TRANSITION_ATTEMPTS} conflicting writes");
        Err(ActivationError::Contention(order_id.clone()))
    }

    /// Marks a pending order as failed after the rail reported a decline. Orders that have already left `pending`
    /// are returned untouched.
    pub async fn decline(&self, order_id: &OrderId, reason: &str) -> Result<DeclineOutcome, ActivationError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let now = Utc::now();
            let current = self.load_live(order_id).await?;
            if current.order.effective_status(now) != OrderStatusType::Pending {
                debug!("✅️ Ignoring decline of order {order_id}. It is already {}.", current.order.status);
                return Ok(DeclineOutcome::AlreadyFinal(current.order));
            }
            let failed = current.order.clone().into_failed(reason, now);
            if !orders::compare_and_swap_order(&self.store, &self.keys, &current, &failed, Expiry::Keep).await? {
                debug!("✅️ Order {order_id} changed while being declined (attempt {attempt}). Re-reading.");
                tokio::task::yield_now().await;
                continue;
            }
            info!("✅️ Order {order_id} failed. {reason}");
            for producer in &self.producers.order_declined_producer {
                producer.publish_event(OrderDeclinedEvent::new(failed.clone(), reason)).await;
            }
            return Ok(DeclineOutcome::Declined(failed));
        }
        Err(ActivationError::Contention(order_id.clone()))
    }

    /// Re-writes the subscription a completed order grants, if the user record does not already reflect it.
    /// Running it any number of times yields the same user record.
    pub async fn repair_subscription(&self, order_id: &OrderId) -> Result<RepairResult, ActivationError> {
        let order = self.load_live(order_id).await?.order;
        if order.status != OrderStatusType::Completed {
            return Err(ActivationError::NotActivatable { order_id: order_id.clone(), status: order.status });
        }
        if let Some(existing) = subscriptions::fetch_subscription(&self.store, &self.keys, order.user_id).await? {
            if existing.reflects(&order) {
                debug!("✅️ Subscription of user {} already reflects order {order_id}", order.user_id);
                return Ok(RepairResult { order_id: order_id.clone(), repaired: false, subscription: Some(existing) });
            }
        }
        let subscription = self.extend_subscription(&order).await?;
        info!("✅️ Repaired subscription of user {} from order {order_id}", order.user_id);
        Ok(RepairResult { order_id: order_id.clone(), repaired: true, subscription: Some(subscription) })
    }

    /// True if the user record grants what the completed `order` paid for.
    pub async fn subscription_reflects(&self, order: &Order) -> Result<bool, StoreError> {
        let subscription = subscriptions::fetch_subscription(&self.store, &self.keys, order.user_id).await?;
        Ok(subscription.map(|s| s.reflects(order)).unwrap_or(false))
    }

    pub async fn fetch_subscription(&self, user_id: UserId) -> Result<Option<UserSubscription>, StoreError> {
        subscriptions::fetch_subscription(&self.store, &self.keys, user_id).await
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(orders::fetch_order(&self.store, &self.keys, order_id).await?.map(|v| v.order))
    }

    /// Loads the order, treating one whose lifetime has lapsed the same as one the store has already evicted.
    async fn load_live(&self, order_id: &OrderId) -> Result<VersionedOrder, ActivationError> {
        let current = orders::fetch_order(&self.store, &self.keys, order_id)
            .await?
            .ok_or_else(|| ActivationError::OrderNotFound(order_id.clone()))?;
        if current.order.effective_status(Utc::now()) == OrderStatusType::Expired {
            return Err(ActivationError::OrderNotFound(order_id.clone()));
        }
        Ok(current)
    }

    /// Keeps the reference index alive as long as the completed order, so late duplicate callbacks still resolve.
    async fn rearm_reference(&self, order: &Order) {
        let expiry = Expiry::After(self.completed_retention);
        let rail = order.payment_method;
        if let Err(e) =
            indices::save_provider_ref(&self.store, &self.keys, rail, &order.provider_ref, &order.order_id, expiry).await
        {
            warn!(
                "✅️ Could not extend the reference index of order {}. Late duplicate callbacks may be counted as \
                 mapping misses. {e}",
                order.order_id
            );
        }
    }

    async fn extend_subscription(&self, order: &Order) -> Result<UserSubscription, ActivationError> {
        let not_extended = |reason: String| ActivationError::SubscriptionNotExtended {
            order_id: order.order_id.clone(),
            user_id: order.user_id,
            reason,
        };
        let subscription = UserSubscription::from_completed_order(order, Utc::now())
            .ok_or_else(|| not_extended("The order has no completion time".to_string()))?;
        if let Err(e) = subscriptions::save_subscription(&self.store, &self.keys, &subscription).await {
            error!(
                "✅️ Order {} is completed but the subscription of user {} could not be written. {e}",
                order.order_id, order.user_id
            );
            return Err(not_extended(e.to_string()));
        }
        info!(
            "✅️ User {} now has {} until {}",
            subscription.user_id, subscription.tier, subscription.subscription_expiry
        );
        Ok(subscription)
    }

    async fn publish_activation(&self, order: &Order, subscription: UserSubscription) {
        for producer in &self.producers.subscription_activated_producer {
            let event = SubscriptionActivatedEvent::new(order.clone(), subscription.clone());
            producer.publish_event(event).await;
        }
    }
}
