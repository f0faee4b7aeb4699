use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use spg_common::MinorUnits;
use uuid::Uuid;

use crate::spg_api::errors::ValidationError;

//--------------------------------------       UserId        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl UserId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

//--------------------------------------       OrderId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Order id cannot be empty".into());
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OrderId {
    /// Creates a fresh, globally unique order id of the form `ord_<32 hex chars>`.
    pub fn random() -> Self {
        Self(format!("ord_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and the customer has been handed payment instructions.
    Pending,
    /// Payment was confirmed and the subscription was activated.
    Completed,
    /// The order ran out its lifetime without a payment confirmation.
    Expired,
    /// The payment provider declined or abandoned the payment.
    Failed,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Expired => write!(f, "expired"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid order status: {s}")),
        }
    }
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }

    /// Orders only ever leave `pending`. Every other status is final.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        matches!(self, OrderStatusType::Pending) && next != OrderStatusType::Pending
    }
}

//--------------------------------------         Tier          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Basic,
    Plus,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Plus, Tier::Premium];

    /// How long a subscription at this tier lasts once activated.
    pub fn duration(&self) -> Duration {
        match self {
            Tier::Basic => Duration::days(7),
            Tier::Plus => Duration::days(30),
            Tier::Premium => Duration::days(90),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "BASIC",
            Tier::Plus => "PLUS",
            Tier::Premium => "PREMIUM",
        }
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BASIC" => Ok(Tier::Basic),
            "PLUS" => Ok(Tier::Plus),
            "PREMIUM" => Ok(Tier::Premium),
            _ => Err(ValidationError::UnknownTier(s.to_string())),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
/// The payment rails the gateway can open an order on. Each rail has its own provider adapter, webhook route and
/// signature scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    MobileMoneyTill,
    CryptoInvoice,
    CardCheckout,
    ExchangeOrder,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::MobileMoneyTill,
        PaymentMethod::CryptoInvoice,
        PaymentMethod::CardCheckout,
        PaymentMethod::ExchangeOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoneyTill => "MOBILE_MONEY_TILL",
            PaymentMethod::CryptoInvoice => "CRYPTO_INVOICE",
            PaymentMethod::CardCheckout => "CARD_CHECKOUT",
            PaymentMethod::ExchangeOrder => "EXCHANGE_ORDER",
        }
    }

    /// The path segment used for this rail's webhook route.
    pub fn slug(&self) -> &'static str {
        match self {
            PaymentMethod::MobileMoneyTill => "mobile-money",
            PaymentMethod::CryptoInvoice => "crypto",
            PaymentMethod::CardCheckout => "checkout",
            PaymentMethod::ExchangeOrder => "exchange",
        }
    }

    /// Only the mobile money rail carries the payer's phone number reliably enough to be used as a fallback lookup.
    pub fn supports_phone_fallback(&self) -> bool {
        matches!(self, PaymentMethod::MobileMoneyTill)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized || m.slug().to_ascii_uppercase().replace('-', "_") == normalized)
            .ok_or_else(|| ValidationError::UnknownMethod(s.to_string()))
    }
}

//--------------------------------------        Region         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    Ke,
    Ng,
    Gh,
    Intl,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Ke, Region::Ng, Region::Gh, Region::Intl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Ke => "KE",
            Region::Ng => "NG",
            Region::Gh => "GH",
            Region::Intl => "INTL",
        }
    }

    /// International dialling code used to normalise local phone numbers. `INTL` numbers must already be in
    /// international form.
    pub fn dialling_code(&self) -> Option<&'static str> {
        match self {
            Region::Ke => Some("254"),
            Region::Ng => Some("234"),
            Region::Gh => Some("233"),
            Region::Intl => None,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KE" => Ok(Region::Ke),
            "NG" => Ok(Region::Ng),
            "GH" => Ok(Region::Gh),
            "INTL" => Ok(Region::Intl),
            _ => Err(ValidationError::UnknownRegion(s.to_string())),
        }
    }
}

//--------------------------------------  PaymentInstructions  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentInstructions {
    Till(TillInstructions),
    CryptoTransfer(CryptoInstructions),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TillInstructions {
    pub till_number: String,
    pub business_name: String,
    /// The reference the customer must type into the account number field.
    pub account_reference: String,
    pub amount: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoInstructions {
    pub address: String,
    pub network: String,
    pub memo: String,
    pub amount: String,
    pub currency: String,
}

//--------------------------------------     OrderMetadata     ---------------------------------------------------------
/// Customer-facing payment instructions and the contact details captured at order creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<PaymentInstructions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Opaque values returned by the provider, e.g. access codes or prepay ids.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_data: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub tier: Tier,
    pub payment_method: PaymentMethod,
    pub region: Region,
    pub base_amount: MinorUnits,
    pub fee: MinorUnits,
    pub total_amount: MinorUnits,
    pub currency: String,
    pub status: OrderStatusType,
    pub provider_ref: String,
    #[serde(default)]
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The status as seen at `now`. A pending order past its expiry is treated as expired even if the store has not
    /// evicted it yet.
    pub fn effective_status(&self, now: DateTime<Utc>) -> OrderStatusType {
        match self.status {
            OrderStatusType::Pending if self.expires_at <= now => OrderStatusType::Expired,
            status => status,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.effective_status(now) == OrderStatusType::Pending && now - self.created_at >= threshold
    }

    /// The subscription expiry this order grants, measured from the moment it completed.
    pub fn entitlement_expiry(&self) -> Option<DateTime<Utc>> {
        self.completed_at.map(|at| at + self.tier.duration())
    }

    pub fn into_completed(mut self, transaction_ref: &str, at: DateTime<Utc>) -> Self {
        self.status = OrderStatusType::Completed;
        self.completed_at = Some(at);
        self.transaction_ref = Some(transaction_ref.to_string());
        self.updated_at = at;
        self
    }

    pub fn into_failed(mut self, reason: &str, at: DateTime<Utc>) -> Self {
        self.status = OrderStatusType::Failed;
        self.metadata.decline_reason = Some(reason.to_string());
        self.updated_at = at;
        self
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order #{} [{}] user {} {} via {} ({}), {} {}",
            self.order_id,
            self.status,
            self.user_id,
            self.tier,
            self.payment_method,
            self.provider_ref,
            self.total_amount,
            self.currency
        )
    }
}

//--------------------------------------   UserSubscription    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSubscription {
    pub user_id: UserId,
    pub tier: Tier,
    pub subscription_expiry: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_order_id: Option<OrderId>,
    pub updated_at: DateTime<Utc>,
}

impl UserSubscription {
    /// Builds the subscription record granted by a completed order. Returns `None` for orders that have not completed.
    pub fn from_completed_order(order: &Order, now: DateTime<Utc>) -> Option<Self> {
        let expiry = order.entitlement_expiry()?;
        Some(Self {
            user_id: order.user_id,
            tier: order.tier,
            subscription_expiry: expiry,
            last_order_id: Some(order.order_id.clone()),
            updated_at: now,
        })
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expiry > now
    }

    /// True if this record accounts for the completed `order`: it was written from that order, it was written after the
    /// order completed (a later purchase replaces the entitlement of an earlier one), or it already grants at least as
    /// much.
    pub fn reflects(&self, order: &Order) -> bool {
        if self.user_id != order.user_id {
            return false;
        }
        if self.last_order_id.as_ref() == Some(&order.order_id) {
            return true;
        }
        if order.completed_at.map(|at| self.updated_at >= at).unwrap_or(false) {
            return true;
        }
        order.entitlement_expiry().map(|expiry| self.subscription_expiry >= expiry).unwrap_or(false)
    }
}
