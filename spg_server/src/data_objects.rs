use std::fmt::Display;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use spg_engine::{
    db_types::{Order, OrderId, OrderStatusType},
    order_objects::{ActivationResult, PendingOrderSummary},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body of `POST /admin/verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOrderParams {
    pub order_id: OrderId,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOrderResponse {
    #[serde(flatten)]
    pub result: ActivationResult,
    pub message: String,
}

impl From<ActivationResult> for VerifyOrderResponse {
    fn from(result: ActivationResult) -> Self {
        let message = if result.is_new_activation() {
            match result.subscription_expiry {
                Some(expiry) => format!("Order {} completed. Subscription active until {expiry}", result.order_id),
                None => format!("Order {} completed", result.order_id),
            }
        } else {
            format!(
                "Order {} was already completed with transaction {}",
                result.order_id,
                result.transaction_ref.as_deref().unwrap_or("<none>")
            )
        };
        Self { result, message }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrdersResponse {
    pub count: usize,
    pub orders: Vec<PendingOrderSummary>,
}

impl PendingOrdersResponse {
    pub fn new(orders: Vec<PendingOrderSummary>) -> Self {
        Self { count: orders.len(), orders }
    }
}

/// An order with its status as of now, rather than as last written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub effective_status: OrderStatusType,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let effective_status = order.effective_status(Utc::now());
        Self { order, effective_status }
    }
}
