use serde::Serialize;
use spg_common::MinorUnits;

use crate::{
    db_types::{OrderId, OrderStatusType, PaymentMethod},
    spg_api::order_objects::ActivationResult,
    webhooks::SignatureError,
};

/// What happened to one inbound callback. The HTTP layer decides how each outcome is acknowledged to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The order is completed. Covers both a fresh activation and an idempotent repeat.
    Activated(ActivationResult),
    /// The provider reported a failed payment and the pending order is now `failed`, or was already final.
    Declined { order_id: OrderId, reason: String },
    /// The callback reports less than the order total. Nothing was changed.
    Underpaid { order_id: OrderId, expected: MinorUnits, received: MinorUnits },
    /// A non-final status, or a callback type we do not act on.
    Ignored { reason: String },
    /// Paid callback for an order that has already failed or expired. Needs a human.
    NotActivatable { order_id: OrderId, status: OrderStatusType },
    /// No live order matches the callback.
    MappingMiss { rail: PaymentMethod, provider_ref: Option<String>, misses_today: i64 },
    SignatureInvalid(SignatureError),
    Malformed(String),
    /// The order completed but the subscription write failed. Requires a repair.
    SubscriptionNotExtended { order_id: OrderId },
    InfraError(String),
}

/// The JSON acknowledgement returned to providers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestAck {
    pub received: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IngestOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Activated(r) if r.is_new_activation() => "activated",
            IngestOutcome::Activated(_) => "already_completed",
            IngestOutcome::Declined { .. } => "declined",
            IngestOutcome::Underpaid { .. } => "underpaid",
            IngestOutcome::Ignored { .. } => "ignored",
            IngestOutcome::NotActivatable { .. } => "not_activatable",
            IngestOutcome::MappingMiss { .. } => "mapping_miss",
            IngestOutcome::SignatureInvalid(_) => "signature_invalid",
            IngestOutcome::Malformed(_) => "malformed",
            IngestOutcome::SubscriptionNotExtended { .. } => "subscription_not_extended",
            IngestOutcome::InfraError(_) => "infra_error",
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            IngestOutcome::Activated(r) => Some(&r.order_id),
            IngestOutcome::Declined { order_id, .. } |
            IngestOutcome::Underpaid { order_id, .. } |
            IngestOutcome::NotActivatable { order_id, .. } |
            IngestOutcome::SubscriptionNotExtended { order_id } => Some(order_id),
            _ => None,
        }
    }

    pub fn ack(&self) -> IngestAck {
        let message = match self {
            IngestOutcome::Declined { reason, .. } | IngestOutcome::Ignored { reason } => Some(reason.clone()),
            IngestOutcome::Underpaid { expected, received, .. } => {
                Some(format!("Received {received}, expected {expected}"))
            },
            IngestOutcome::NotActivatable { status, .. } => Some(format!("Order is {status}")),
            IngestOutcome::MappingMiss { .. } => Some("No matching order".to_string()),
            IngestOutcome::SignatureInvalid(e) => Some(e.to_string()),
            IngestOutcome::Malformed(e) => Some(e.clone()),
            IngestOutcome::SubscriptionNotExtended { .. } | IngestOutcome::InfraError(_) => {
                Some("Temporary failure. Please retry.".to_string())
            },
            IngestOutcome::Activated(_) => None,
        };
        let received = !matches!(
            self,
            IngestOutcome::SignatureInvalid(_) |
                IngestOutcome::Malformed(_) |
                IngestOutcome::InfraError(_) |
                IngestOutcome::SubscriptionNotExtended { .. }
        );
        IngestAck { received, outcome: self.label(), order_id: self.order_id().cloned(), message }
    }
}
