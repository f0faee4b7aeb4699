use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spg_common::MinorUnits;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, PaymentMethod, Region, Tier, UserId, UserSubscription},
    spg_api::errors::ValidationError,
};

/// Contact details the chat layer collected from the customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderRequest {
    pub user_id: UserId,
    pub tier: Tier,
    pub method: PaymentMethod,
    pub region: Region,
    pub context: OrderContext,
}

impl NewOrderRequest {
    pub fn new(user_id: UserId, tier: Tier, method: PaymentMethod, region: Region) -> Self {
        Self { user_id, tier, method, region, context: OrderContext::default() }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.context.phone = Some(phone.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.context.email = Some(email.into());
        self
    }
}

/// The order request as it arrives over the wire, before names have been checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderPayload {
    pub user_id: i64,
    pub tier: String,
    pub method: String,
    pub region: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TryFrom<NewOrderPayload> for NewOrderRequest {
    type Error = ValidationError;

    fn try_from(payload: NewOrderPayload) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: UserId(payload.user_id),
            tier: payload.tier.parse()?,
            method: payload.method.parse()?,
            region: payload.region.parse()?,
            context: OrderContext { phone: payload.phone, email: payload.email },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// This call completed the order and extended the subscription.
    Activated,
    /// The order had already been completed. Nothing was changed.
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationResult {
    pub success: bool,
    pub outcome: ActivationOutcome,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub tier: Tier,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub transaction_ref: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActivationResult {
    pub fn new(outcome: ActivationOutcome, order: &Order) -> Self {
        Self {
            success: true,
            outcome,
            order_id: order.order_id.clone(),
            user_id: order.user_id,
            tier: order.tier,
            subscription_expiry: order.entitlement_expiry(),
            transaction_ref: order.transaction_ref.clone(),
            completed_at: order.completed_at,
        }
    }

    pub fn is_new_activation(&self) -> bool {
        self.outcome == ActivationOutcome::Activated
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineOutcome {
    /// The pending order is now `failed`.
    Declined(Order),
    /// The order had already left `pending`. It was not touched.
    AlreadyFinal(Order),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairResult {
    pub order_id: OrderId,
    /// True if the subscription record had to be rewritten.
    pub repaired: bool,
    pub subscription: Option<UserSubscription>,
}

/// A pending order as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderSummary {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub tier: Tier,
    pub payment_method: PaymentMethod,
    pub provider_ref: String,
    pub total_amount: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub age_minutes: i64,
}

impl PendingOrderSummary {
    pub fn new(order: &Order, now: DateTime<Utc>) -> Self {
        Self {
            order_id: order.order_id.clone(),
            user_id: order.user_id,
            tier: order.tier,
            payment_method: order.payment_method,
            provider_ref: order.provider_ref.clone(),
            total_amount: order.total_amount,
            currency: order.currency.clone(),
            status: order.effective_status(now),
            created_at: order.created_at,
            expires_at: order.expires_at,
            age_minutes: (now - order.created_at).num_minutes(),
        }
    }
}
