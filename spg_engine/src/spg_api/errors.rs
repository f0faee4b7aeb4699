use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType, PaymentMethod, Region, Tier, UserId},
    providers::ProviderAdapterError,
    traits::StoreError,
};

/// The request was rejected before any I/O took place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),
    #[error("Unknown payment method: {0}")]
    UnknownMethod(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("{method} is not offered for {tier} in {region}")]
    MethodNotOffered { tier: Tier, region: Region, method: PaymentMethod },
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
    #[error("{0} requires a phone number")]
    PhoneRequired(PaymentMethod),
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("{0} requires an email address")]
    EmailRequired(PaymentMethod),
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error("Invalid order request. {0}")]
    Validation(#[from] ValidationError),
    #[error("The payment provider could not open the payment. {0}")]
    ProviderAdapter(#[from] ProviderAdapterError),
    #[error("Storage error. {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("Could not find a free provider reference for {0} after several attempts")]
    ReferenceExhausted(PaymentMethod),
}

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("Order {0} does not exist or has expired")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status} and cannot be activated")]
    NotActivatable { order_id: OrderId, status: OrderStatusType },
    #[error(
        "Order {order_id} is completed but the subscription for user {user_id} could not be extended. {reason}. Run a \
         repair for this order."
    )]
    SubscriptionNotExtended { order_id: OrderId, user_id: UserId, reason: String },
    #[error("Order {0} kept changing underneath the update. Giving up.")]
    Contention(OrderId),
    #[error("Storage error. {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Storage error. {0}")]
    StoreUnavailable(#[from] StoreError),
}
