//! # Provider adapters
//!
//! Each payment rail has an adapter that turns a priced order into something the customer can act on: till
//! instructions, a deposit address and memo, or a hosted checkout URL. The set of rails is closed, so dispatch is a
//! single exhaustive `match` in [`ProviderAdapters::open_payment`].
//!
//! The mobile money and crypto adapters are local and never fail once configured. The card checkout and exchange
//! adapters call out over HTTP and can fail with network, timeout or rejection errors. A rail whose configuration is
//! missing fails with [`ProviderAdapterError::NotConfigured`] before any I/O.
mod checkout;
mod config;
mod crypto;
mod exchange;
mod till;

pub use checkout::CardCheckoutAdapter;
pub use config::{CheckoutConfig, CryptoConfig, ExchangeConfig, ProvidersConfig, TillConfig};
pub use crypto::CryptoInvoiceAdapter;
pub use exchange::ExchangeOrderAdapter;
pub use till::TillAdapter;
use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderMetadata, PaymentMethod, Tier, UserId},
    pricing::Quote,
};

#[derive(Debug, Clone, Error)]
pub enum ProviderAdapterError {
    #[error("{0} is not configured on this gateway")]
    NotConfigured(PaymentMethod),
    #[error("Could not initialize the provider client. {0}")]
    Initialization(String),
    #[error("Could not reach the payment provider. {0}")]
    Network(String),
    #[error("The payment provider did not respond in time")]
    Timeout,
    #[error("The payment provider rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment provider sent a response we could not understand. {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderAdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderAdapterError::Timeout
        } else {
            ProviderAdapterError::Network(e.to_string())
        }
    }
}

/// Everything an adapter may need to open a payment for one order.
#[derive(Debug, Clone)]
pub struct PaymentRequest<'a> {
    pub order_id: &'a OrderId,
    pub user_id: UserId,
    pub tier: Tier,
    pub reference: &'a str,
    pub quote: &'a Quote,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderAdapters {
    till: Option<TillAdapter>,
    crypto: Option<CryptoInvoiceAdapter>,
    checkout: Option<CardCheckoutAdapter>,
    exchange: Option<ExchangeOrderAdapter>,
}

impl ProviderAdapters {
    pub fn new(config: ProvidersConfig) -> Result<Self, ProviderAdapterError> {
        let timeout = config.timeout;
        let checkout = config.checkout.map(|c| CardCheckoutAdapter::new(c, timeout)).transpose()?;
        let exchange = config.exchange.map(|c| ExchangeOrderAdapter::new(c, timeout)).transpose()?;
        Ok(Self {
            till: config.till.map(TillAdapter::new),
            crypto: config.crypto.map(CryptoInvoiceAdapter::new),
            checkout,
            exchange,
        })
    }

    pub fn is_configured(&self, method: PaymentMethod) -> bool {
        match method {
            PaymentMethod::MobileMoneyTill => self.till.is_some(),
            PaymentMethod::CryptoInvoice => self.crypto.is_some(),
            PaymentMethod::CardCheckout => self.checkout.is_some(),
            PaymentMethod::ExchangeOrder => self.exchange.is_some(),
        }
    }

    /// Asks the rail's provider to open a payment for the order and returns the customer-facing metadata.
    pub async fn open_payment(
        &self,
        method: PaymentMethod,
        request: &PaymentRequest<'_>,
    ) -> Result<OrderMetadata, ProviderAdapterError> {
        let not_configured = || ProviderAdapterError::NotConfigured(method);
        match method {
            PaymentMethod::MobileMoneyTill => Ok(self.till.as_ref().ok_or_else(not_configured)?.open_payment(request)),
            PaymentMethod::CryptoInvoice => Ok(self.crypto.as_ref().ok_or_else(not_configured)?.open_payment(request)),
            PaymentMethod::CardCheckout => self.checkout.as_ref().ok_or_else(not_configured)?.open_payment(request).await,
            PaymentMethod::ExchangeOrder => self.exchange.as_ref().ok_or_else(not_configured)?.open_payment(request).await,
        }
    }
}
