//! Provider callback payloads.
//!
//! Each rail posts its own JSON shape. They are all normalised into a [`CallbackEvent`] so that resolution and
//! activation never need to know which provider sent the callback.
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use spg_common::{parse_decimal_amount, MinorUnits};

use crate::{db_types::PaymentMethod, helpers::extract_provider_references, webhooks::IngestError};

/// What the provider says happened to the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackStatus {
    /// The payment settled.
    Paid,
    /// The payment was declined, closed or abandoned. Carries the provider's reason.
    Failed(String),
    /// An intermediate status that requires no action.
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub rail: PaymentMethod,
    pub status: CallbackStatus,
    pub provider_ref: Option<String>,
    /// Every reference found in the provider's reference field, `provider_ref` first.
    pub reference_candidates: Vec<String>,
    pub transaction_ref: Option<String>,
    pub amount: Option<MinorUnits>,
    pub currency: Option<String>,
    pub phone: Option<String>,
}

impl CallbackEvent {
    pub fn parse(rail: PaymentMethod, body: &[u8]) -> Result<Self, IngestError> {
        let mut event = match rail {
            PaymentMethod::MobileMoneyTill => parse_json::<TillConfirmation>(body)?.into_event(),
            PaymentMethod::CryptoInvoice => parse_json::<InvoiceCallback>(body)?.into_event(),
            PaymentMethod::CardCheckout => parse_json::<CheckoutCallback>(body)?.into_event(),
            PaymentMethod::ExchangeOrder => parse_json::<ExchangeNotification>(body)?.into_event()?,
        };
        event.provider_ref = event.reference_candidates.first().cloned();
        if event.status == CallbackStatus::Paid && event.transaction_ref.is_none() {
            return Err(IngestError::Malformed(format!("{rail} payment confirmation carries no transaction id")));
        }
        Ok(event)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T, IngestError> {
    serde_json::from_slice::<T>(body).map_err(|e| IngestError::Malformed(e.to_string()))
}

/// Provider references are typed by hand on some rails. Pull the references out of the text if we can, otherwise use
/// the trimmed text as-is.
fn normalize_reference(raw: Option<String>, rail: PaymentMethod) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let found = extract_provider_references(trimmed, rail);
    if found.is_empty() {
        vec![trimmed.to_uppercase()]
    } else {
        found
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Amounts in major units, sent either as a decimal string or as a JSON number.
fn major_amount<'de, D>(deserializer: D) -> Result<Option<MinorUnits>, D::Error>
where D: Deserializer<'de> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => parse_decimal_amount(s.trim()).map(Some).map_err(de::Error::custom),
        Some(Value::Number(n)) => parse_decimal_amount(&n.to_string()).map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("Invalid amount: {other}"))),
    }
}

/// Identifiers that some providers send as numbers and others as strings.
fn id_string(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(Some(s)),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//--------------------------------------   Mobile money till   ---------------------------------------------------------
#[derive(Debug, Deserialize)]
struct TillConfirmation {
    #[serde(rename = "TransID")]
    trans_id: String,
    #[serde(rename = "TransAmount", default, deserialize_with = "major_amount")]
    trans_amount: Option<MinorUnits>,
    #[serde(rename = "BillRefNumber", default)]
    bill_ref_number: Option<String>,
    #[serde(rename = "MSISDN", default)]
    msisdn: Option<String>,
    #[serde(rename = "ResultCode", default)]
    result_code: Option<Value>,
    #[serde(rename = "ResultDesc", default)]
    result_desc: Option<String>,
}

impl TillConfirmation {
    fn into_event(self) -> CallbackEvent {
        let succeeded = match &self.result_code {
            None | Some(Value::Null) => true,
            Some(Value::Number(n)) => n.as_i64() == Some(0),
            Some(Value::String(s)) => s.trim() == "0",
            Some(_) => false,
        };
        let status = if succeeded {
            CallbackStatus::Paid
        } else {
            CallbackStatus::Failed(self.result_desc.unwrap_or_else(|| "Mobile money payment failed".to_string()))
        };
        let rail = PaymentMethod::MobileMoneyTill;
        CallbackEvent {
            rail,
            status,
            provider_ref: None,
            reference_candidates: normalize_reference(self.bill_ref_number, rail),
            transaction_ref: non_empty(Some(self.trans_id)),
            amount: self.trans_amount,
            currency: None,
            phone: non_empty(self.msisdn),
        }
    }
}

//--------------------------------------    Crypto invoice     ---------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceCallback {
    #[serde(alias = "memo", alias = "reference")]
    invoice_ref: Option<String>,
    status: String,
    #[serde(default, alias = "txid")]
    tx_hash: Option<String>,
    #[serde(default, deserialize_with = "major_amount")]
    amount: Option<MinorUnits>,
    #[serde(default)]
    currency: Option<String>,
}

impl InvoiceCallback {
    fn into_event(self) -> CallbackEvent {
        let status = match self.status.to_ascii_lowercase().as_str() {
            "paid" | "confirmed" | "finished" | "completed" => CallbackStatus::Paid,
            "failed" | "expired" | "cancelled" | "canceled" | "refunded" => CallbackStatus::Failed(self.status),
            _ => CallbackStatus::Pending(self.status),
        };
        let rail = PaymentMethod::CryptoInvoice;
        CallbackEvent {
            rail,
            status,
            provider_ref: None,
            reference_candidates: normalize_reference(self.invoice_ref, rail),
            transaction_ref: non_empty(self.tx_hash),
            amount: self.amount,
            currency: non_empty(self.currency).map(|c| c.to_uppercase()),
            phone: None,
        }
    }
}

//--------------------------------------     Card checkout     ---------------------------------------------------------
#[derive(Debug, Deserialize)]
struct CheckoutCallback {
    event: String,
    data: CheckoutCallbackData,
}

#[derive(Debug, Deserialize)]
struct CheckoutCallbackData {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    reference: Option<String>,
    /// Already in minor units.
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

impl CheckoutCallback {
    fn into_event(self) -> CallbackEvent {
        let data = self.data;
        let charge_status = data.status.clone().unwrap_or_default().to_ascii_lowercase();
        let status = match self.event.as_str() {
            "charge.success" if charge_status.is_empty() || charge_status == "success" => CallbackStatus::Paid,
            "charge.failed" => CallbackStatus::Failed(
                data.gateway_response.clone().unwrap_or_else(|| "Card charge failed".to_string()),
            ),
            other => CallbackStatus::Pending(format!("{other} {charge_status}").trim().to_string()),
        };
        let rail = PaymentMethod::CardCheckout;
        CallbackEvent {
            rail,
            status,
            provider_ref: None,
            reference_candidates: normalize_reference(data.reference, rail),
            transaction_ref: id_string(data.id),
            amount: data.amount.map(MinorUnits::from),
            currency: non_empty(data.currency).map(|c| c.to_uppercase()),
            phone: None,
        }
    }
}

//--------------------------------------    Exchange order     ---------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeNotification {
    biz_type: String,
    biz_status: String,
    /// A JSON document, usually sent as an encoded string.
    data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeNotificationData {
    merchant_trade_no: Option<String>,
    #[serde(default)]
    transaction_id: Option<Value>,
    #[serde(default, deserialize_with = "major_amount")]
    total_fee: Option<MinorUnits>,
    #[serde(default)]
    currency: Option<String>,
}

impl ExchangeNotification {
    fn into_event(self) -> Result<CallbackEvent, IngestError> {
        let data = match self.data {
            Value::String(s) => serde_json::from_str::<ExchangeNotificationData>(&s),
            other => serde_json::from_value::<ExchangeNotificationData>(other),
        }
        .map_err(|e| IngestError::Malformed(format!("Invalid exchange notification data. {e}")))?;
        let status = match (self.biz_type.as_str(), self.biz_status.as_str()) {
            ("PAY", "PAY_SUCCESS") => CallbackStatus::Paid,
            ("PAY", "PAY_CLOSED") => CallbackStatus::Failed("Exchange order closed".to_string()),
            (biz_type, biz_status) => CallbackStatus::Pending(format!("{biz_type} {biz_status}")),
        };
        let rail = PaymentMethod::ExchangeOrder;
        Ok(CallbackEvent {
            rail,
            status,
            provider_ref: None,
            reference_candidates: normalize_reference(data.merchant_trade_no, rail),
            transaction_ref: id_string(data.transaction_id),
            amount: data.total_fee,
            currency: non_empty(data.currency).map(|c| c.to_uppercase()),
            phone: None,
        })
    }
}
