use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{OrderId, OrderStatusType, PaymentMethod},
    helpers::normalize_msisdn,
    records::{counters, indices},
    spg_api::{activation_api::ActivationApi, errors::ActivationError, webhook_objects::IngestOutcome},
    traits::{KeyValueStore, StoreError},
    webhooks::{CallbackEvent, CallbackStatus, IngestError, SignatureVerifier, Verification},
};

/// `WebhookApi` turns an inbound provider callback into exactly one [`IngestOutcome`].
///
/// It never returns an error: every failure is an outcome, and the HTTP layer decides how the provider is answered.
/// Settlement is always delegated to [`ActivationApi`], the same engine the admin override uses.
pub struct WebhookApi<S> {
    verifier: SignatureVerifier,
    activation: ActivationApi<S>,
}

impl<S> Debug for WebhookApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<S> WebhookApi<S> {
    pub fn new(verifier: SignatureVerifier, activation: ActivationApi<S>) -> Self {
        Self { verifier, activation }
    }

    pub fn activation(&self) -> &ActivationApi<S> {
        &self.activation
    }
}

impl<S> WebhookApi<S>
where S: KeyValueStore
{
    pub async fn ingest(&self, rail: PaymentMethod, signature: Option<&str>, body: &[u8]) -> IngestOutcome {
        match self.verifier.verify(rail, signature, body) {
            Ok(Verification::Verified) => {},
            Ok(Verification::Permissive) => debug!("📨️ Processing unverified {rail} callback"),
            Err(e) => {
                warn!("📨️ Rejecting {rail} callback. {e}");
                return IngestOutcome::SignatureInvalid(e);
            },
        }
        let event = match CallbackEvent::parse(rail, body) {
            Ok(event) => event,
            Err(IngestError::Signature(e)) => return IngestOutcome::SignatureInvalid(e),
            Err(IngestError::Malformed(reason)) => {
                warn!("📨️ Could not read {rail} callback. {reason}");
                return IngestOutcome::Malformed(reason);
            },
        };
        trace!("📨️ {rail} callback: {event:?}");
        if let CallbackStatus::Pending(status) = &event.status {
            debug!("📨️ Ignoring {rail} callback with non-final status '{status}'");
            return IngestOutcome::Ignored { reason: format!("Non-final status '{status}'") };
        }
        let order_id = match self.resolve(&event).await {
            Ok(Some(order_id)) => order_id,
            Ok(None) => return self.record_mapping_miss(&event).await,
            Err(e) => return infra_error(rail, e),
        };
        match &event.status {
            CallbackStatus::Failed(reason) => self.decline(&event, &order_id, reason).await,
            _ => self.settle(&event, &order_id).await,
        }
    }

    /// Finds the order a callback is about: by provider reference first, then by phone for rails that support it.
    async fn resolve(&self, event: &CallbackEvent) -> Result<Option<OrderId>, StoreError> {
        let store = self.activation.store();
        let keys = self.activation.keys();
        for reference in &event.reference_candidates {
            if let Some(order_id) = indices::resolve_provider_ref(store, keys, event.rail, reference).await? {
                return Ok(Some(order_id));
            }
        }
        if !event.rail.supports_phone_fallback() {
            return Ok(None);
        }
        let Some(phone) = event.phone.as_deref().and_then(normalize_msisdn) else {
            return Ok(None);
        };
        let order_id = indices::resolve_phone(store, keys, &phone).await?;
        if let Some(order_id) = &order_id {
            info!("📨️ Resolved {} callback to order {order_id} by phone number", event.rail);
        }
        Ok(order_id)
    }

    async fn record_mapping_miss(&self, event: &CallbackEvent) -> IngestOutcome {
        let today = Utc::now().date_naive();
        let store = self.activation.store();
        match counters::record_mapping_miss(store, self.activation.keys(), today).await {
            Ok(misses_today) => {
                warn!(
                    "📨️ {} callback for reference {} matches no order. {misses_today} unmatched callbacks today.",
                    event.rail,
                    event.provider_ref.as_deref().unwrap_or("<none>")
                );
                IngestOutcome::MappingMiss { rail: event.rail, provider_ref: event.provider_ref.clone(), misses_today }
            },
            Err(e) => infra_error(event.rail, e),
        }
    }

    async fn decline(&self, event: &CallbackEvent, order_id: &OrderId, reason: &str) -> IngestOutcome {
        match self.activation.decline(order_id, reason).await {
            Ok(_) => IngestOutcome::Declined { order_id: order_id.clone(), reason: reason.to_string() },
            Err(ActivationError::OrderNotFound(_)) => self.record_mapping_miss(event).await,
            Err(e) => infra_error(event.rail, e),
        }
    }

    async fn settle(&self, event: &CallbackEvent, order_id: &OrderId) -> IngestOutcome {
        let order = match self.activation.fetch_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => return self.record_mapping_miss(event).await,
            Err(e) => return infra_error(event.rail, e),
        };
        if order.effective_status(Utc::now()) == OrderStatusType::Pending {
            let same_currency =
                event.currency.as_deref().map(|c| c.eq_ignore_ascii_case(&order.currency)).unwrap_or(true);
            if let Some(received) = event.amount.filter(|amount| same_currency && *amount < order.total_amount) {
                warn!(
                    "📨️ {} callback for order {order_id} reports {received} but {} {} is due. Not activating.",
                    event.rail, order.total_amount, order.currency
                );
                return IngestOutcome::Underpaid { order_id: order_id.clone(), expected: order.total_amount, received };
            }
        }
        // A paid callback always carries a transaction reference; CallbackEvent::parse rejects those that don't.
        let transaction_ref = event.transaction_ref.as_deref().unwrap_or_default();
        match self.activation.activate(order_id, transaction_ref).await {
            Ok(result) => IngestOutcome::Activated(result),
            Err(ActivationError::OrderNotFound(_)) => self.record_mapping_miss(event).await,
            Err(ActivationError::NotActivatable { order_id, status }) => {
                warn!("📨️ Payment received for order {order_id}, which is {status}. Needs manual follow-up.");
                IngestOutcome::NotActivatable { order_id, status }
            },
            Err(ActivationError::SubscriptionNotExtended { order_id, .. }) => {
                IngestOutcome::SubscriptionNotExtended { order_id }
            },
            Err(e) => infra_error(event.rail, e),
        }
    }
}

fn infra_error<E: std::fmt::Display>(rail: PaymentMethod, e: E) -> IngestOutcome {
    error!("📨️ Could not process {rail} callback. {e}");
    IngestOutcome::InfraError(e.to_string())
}
