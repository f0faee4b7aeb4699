use std::{env, time::Duration};

use log::*;
use spg_common::{parse_boolean_flag, parse_number_or, Secret};
use spg_engine::{
    db_types::PaymentMethod,
    notifiers::{TelegramConfig, DEFAULT_TELEGRAM_API},
    providers::ProvidersConfig,
    spg_api::monitor_objects::MonitorConfig,
    webhooks::WebhookSecrets,
};

const DEFAULT_SPG_HOST: &str = "127.0.0.1";
const DEFAULT_SPG_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/spg.db";
const DEFAULT_ORDER_TTL_SECS: u64 = 900;
const DEFAULT_COMPLETED_RETENTION_SECS: u64 = 86_400;
const DEFAULT_STALE_ORDER_MINUTES: i64 = 10;
const DEFAULT_STALE_ORDER_ALERT_THRESHOLD: usize = 1;
const DEFAULT_MAPPING_MISS_THRESHOLD: i64 = 5;
const DEFAULT_ALERT_THROTTLE_SECS: u64 = 3600;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Prefix for every store key, so that several deployments can share one store.
    pub key_namespace: Option<String>,
    /// Bearer tokens accepted on the `/admin` and `/api` scopes. If empty, those routes reject every request.
    pub admin_tokens: Vec<Secret<String>>,
    /// How long an unpaid order lives before it lapses.
    pub order_ttl: Duration,
    /// How long a completed order and its reference index stay resolvable.
    pub completed_retention: Duration,
    pub monitor: MonitorConfig,
    /// If set, the health monitor runs inside the server at this interval.
    pub monitor_interval: Option<Duration>,
    /// Path to a JSON price table. The built-in table is used if this is `None`.
    pub price_table: Option<String>,
    pub store_timeout: Duration,
    pub providers: ProvidersConfig,
    pub webhook_secrets: WebhookSecrets,
    /// Operator chat for alerts. Alerts only go to the log if this is `None`.
    pub telegram: Option<TelegramConfig>,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SPG_HOST.to_string(),
            port: DEFAULT_SPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            key_namespace: None,
            admin_tokens: vec![],
            order_ttl: Duration::from_secs(DEFAULT_ORDER_TTL_SECS),
            completed_retention: Duration::from_secs(DEFAULT_COMPLETED_RETENTION_SECS),
            monitor: MonitorConfig::default(),
            monitor_interval: None,
            price_table: None,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            providers: ProvidersConfig::default(),
            webhook_secrets: WebhookSecrets::default(),
            telegram: None,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = var("SPG_HOST").unwrap_or_else(|| DEFAULT_SPG_HOST.into());
        let port = var("SPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SPG_PORT. {e} Using the default, {DEFAULT_SPG_PORT}, instead."
                    );
                    DEFAULT_SPG_PORT
                })
            })
            .unwrap_or(DEFAULT_SPG_PORT);
        let database_url = var("SPG_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ SPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let key_namespace = var("SPG_KEY_NAMESPACE");
        let admin_tokens = configure_admin_tokens();
        let order_ttl = Duration::from_secs(seconds_or("SPG_ORDER_TTL_SECS", DEFAULT_ORDER_TTL_SECS));
        let completed_retention =
            Duration::from_secs(seconds_or("SPG_COMPLETED_RETENTION_SECS", DEFAULT_COMPLETED_RETENTION_SECS));
        let monitor = configure_monitor(order_ttl);
        let monitor_interval = match var("SPG_MONITOR_INTERVAL_SECS").map(|s| s.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => Some(Duration::from_secs(secs)),
            Some(_) => {
                warn!("🪛️ SPG_MONITOR_INTERVAL_SECS must be a positive number of seconds. The monitor will not run.");
                None
            },
            None => {
                info!("🪛️ SPG_MONITOR_INTERVAL_SECS is not set. Call POST /admin/monitor/run from a scheduler instead.");
                None
            },
        };
        let price_table = var("SPG_PRICE_TABLE");
        let store_timeout = Duration::from_millis(parse_number_or(var("SPG_STORE_TIMEOUT_MS"), DEFAULT_STORE_TIMEOUT_MS));
        let providers = ProvidersConfig::new_from_env();
        let webhook_secrets = configure_webhook_secrets();
        let telegram = configure_telegram();
        let use_x_forwarded_for = parse_boolean_flag(var("SPG_USE_X_FORWARDED_FOR"), false);
        let use_forwarded = parse_boolean_flag(var("SPG_USE_FORWARDED"), false);
        Self {
            host,
            port,
            database_url,
            key_namespace,
            admin_tokens,
            order_ttl,
            completed_retention,
            monitor,
            monitor_interval,
            price_table,
            store_timeout,
            providers,
            webhook_secrets,
            telegram,
            use_x_forwarded_for,
            use_forwarded,
        }
    }
}

fn seconds_or(name: &str, default: u64) -> u64 {
    match var(name).map(|s| s.parse::<u64>()) {
        Some(Ok(secs)) if secs > 0 => secs,
        Some(_) => {
            warn!("🪛️ Invalid configuration value for {name}. Using the default of {default} seconds.");
            default
        },
        None => default,
    }
}

fn configure_admin_tokens() -> Vec<Secret<String>> {
    let tokens = var("SPG_ADMIN_TOKENS")
        .map(|s| s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(|t| Secret::new(t.to_string())).collect())
        .unwrap_or_else(Vec::new);
    if tokens.is_empty() {
        warn!("🚨️ SPG_ADMIN_TOKENS is not set. All /admin and /api requests will be refused.");
    } else {
        info!("🪛️ {} admin token(s) configured", tokens.len());
    }
    tokens
}

fn configure_monitor(order_ttl: Duration) -> MonitorConfig {
    let mut stale_minutes = parse_number_or(var("SPG_STALE_ORDER_MINUTES"), DEFAULT_STALE_ORDER_MINUTES);
    let ttl_minutes = i64::try_from(order_ttl.as_secs() / 60).unwrap_or(i64::MAX);
    if stale_minutes >= ttl_minutes {
        let adjusted = (ttl_minutes * 2 / 3).max(1);
        warn!(
            "🪛️ SPG_STALE_ORDER_MINUTES ({stale_minutes}) is not below the order lifetime of {ttl_minutes} minutes. \
             Stale orders would expire before they are noticed. Using {adjusted} minutes instead."
        );
        stale_minutes = adjusted;
    }
    MonitorConfig {
        stale_after: chrono::Duration::minutes(stale_minutes),
        stale_alert_threshold: parse_number_or(
            var("SPG_STALE_ORDER_ALERT_THRESHOLD"),
            DEFAULT_STALE_ORDER_ALERT_THRESHOLD,
        ),
        mapping_miss_threshold: parse_number_or(var("SPG_MAPPING_MISS_THRESHOLD"), DEFAULT_MAPPING_MISS_THRESHOLD),
        alert_throttle: Duration::from_secs(seconds_or("SPG_ALERT_THROTTLE_SECS", DEFAULT_ALERT_THROTTLE_SECS)),
    }
}

fn configure_webhook_secrets() -> WebhookSecrets {
    let mut secrets = WebhookSecrets::default();
    for (rail, name) in [
        (PaymentMethod::MobileMoneyTill, "SPG_MOBILE_MONEY_WEBHOOK_SECRET"),
        (PaymentMethod::CryptoInvoice, "SPG_CRYPTO_WEBHOOK_SECRET"),
        (PaymentMethod::CardCheckout, "SPG_CHECKOUT_WEBHOOK_SECRET"),
        (PaymentMethod::ExchangeOrder, "SPG_EXCHANGE_WEBHOOK_SECRET"),
    ] {
        match var(name) {
            Some(secret) => secrets = secrets.with_secret(rail, &secret),
            None => warn!(
                "🚨️ {name} is not set. Unsigned {rail} callbacks will be accepted. Do not run production like this."
            ),
        }
    }
    secrets
}

fn configure_telegram() -> Option<TelegramConfig> {
    match (var("SPG_ALERT_TELEGRAM_TOKEN"), var("SPG_ALERT_TELEGRAM_CHAT_ID")) {
        (Some(token), Some(chat_id)) => {
            let api = var("SPG_ALERT_TELEGRAM_API").unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string());
            Some(TelegramConfig::new(Secret::new(token), chat_id).with_api_base(api))
        },
        (Some(_), None) => {
            warn!("🪛️ SPG_ALERT_TELEGRAM_TOKEN is set but SPG_ALERT_TELEGRAM_CHAT_ID is not. Alerts will only be logged.");
            None
        },
        _ => None,
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}
