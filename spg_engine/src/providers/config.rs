use std::{env, time::Duration};

use log::*;
use spg_common::{parse_number_or, Secret};

const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct TillConfig {
    pub till_number: String,
    pub business_name: String,
}

#[derive(Debug, Clone)]
pub struct CryptoConfig {
    pub deposit_address: String,
    pub network: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    pub base_url: String,
    pub secret_key: Secret<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
}

/// Settings for every rail. A rail with `None` is not offered by this deployment.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub till: Option<TillConfig>,
    pub crypto: Option<CryptoConfig>,
    pub checkout: Option<CheckoutConfig>,
    pub exchange: Option<ExchangeConfig>,
    pub timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            till: None,
            crypto: None,
            checkout: None,
            exchange: None,
            timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProvidersConfig {
    pub fn new_from_env() -> Self {
        let till = match (var("SPG_TILL_NUMBER"), var("SPG_TILL_BUSINESS_NAME")) {
            (Some(till_number), business_name) => Some(TillConfig {
                till_number,
                business_name: business_name.unwrap_or_else(|| "Subscriptions".to_string()),
            }),
            (None, _) => {
                info!("🪛️ SPG_TILL_NUMBER is not set. Mobile money payments are disabled.");
                None
            },
        };
        let crypto = match var("SPG_CRYPTO_DEPOSIT_ADDRESS") {
            Some(deposit_address) => Some(CryptoConfig {
                deposit_address,
                network: var("SPG_CRYPTO_NETWORK").unwrap_or_else(|| "TRC20".to_string()),
            }),
            None => {
                info!("🪛️ SPG_CRYPTO_DEPOSIT_ADDRESS is not set. Crypto invoices are disabled.");
                None
            },
        };
        let checkout = match (var("SPG_CHECKOUT_BASE_URL"), var("SPG_CHECKOUT_SECRET_KEY")) {
            (Some(base_url), Some(secret)) => Some(CheckoutConfig {
                base_url,
                secret_key: Secret::new(secret),
                callback_url: var("SPG_CHECKOUT_CALLBACK_URL"),
            }),
            (Some(_), None) => {
                warn!("🪛️ SPG_CHECKOUT_BASE_URL is set but SPG_CHECKOUT_SECRET_KEY is not. Card checkout is disabled.");
                None
            },
            _ => {
                info!("🪛️ Card checkout is not configured.");
                None
            },
        };
        let exchange = match (var("SPG_EXCHANGE_BASE_URL"), var("SPG_EXCHANGE_API_KEY"), var("SPG_EXCHANGE_API_SECRET")) {
            (Some(base_url), Some(key), Some(secret)) => {
                Some(ExchangeConfig { base_url, api_key: Secret::new(key), api_secret: Secret::new(secret) })
            },
            (None, None, None) => {
                info!("🪛️ Exchange orders are not configured.");
                None
            },
            _ => {
                warn!(
                    "🪛️ Exchange orders need SPG_EXCHANGE_BASE_URL, SPG_EXCHANGE_API_KEY and SPG_EXCHANGE_API_SECRET. \
                     Exchange orders are disabled."
                );
                None
            },
        };
        let timeout_ms = parse_number_or(env::var("SPG_PROVIDER_TIMEOUT_MS").ok(), DEFAULT_PROVIDER_TIMEOUT_MS);
        let timeout = Duration::from_millis(timeout_ms);
        Self { till, crypto, checkout, exchange, timeout }
    }
}
