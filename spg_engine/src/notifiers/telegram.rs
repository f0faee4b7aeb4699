use std::time::Duration;

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use spg_common::Secret;

use crate::traits::{Alert, AlertNotifier, NotifierError};

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub token: Secret<String>,
    pub chat_id: String,
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new<S: Into<String>>(token: Secret<String>, chat_id: S) -> Self {
        Self { api_base: DEFAULT_TELEGRAM_API.to_string(), token, chat_id: chat_id.into(), timeout: Duration::from_secs(10) }
    }

    pub fn with_api_base<S: Into<String>>(mut self, api_base: S) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends alerts to an operator chat through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifierError> {
        if !config.token.is_set() || config.chat_id.trim().is_empty() {
            return Err(NotifierError::NotConfigured("A bot token and chat id are required".to_string()));
        }
        let client =
            Client::builder().timeout(config.timeout).build().map_err(|e| NotifierError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.config.api_base.trim_end_matches('/'), self.config.token.reveal())
    }
}

impl AlertNotifier for TelegramNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError> {
        let text = format!("⚠️ {}\n{}\n{}", alert.condition, alert.message, alert.raised_at.format("%Y-%m-%d %H:%M UTC"));
        let body = json!({ "chat_id": self.config.chat_id, "text": text, "disable_web_page_preview": true });
        // The URL embeds the bot token, so reqwest errors are reported without it.
        let response = self
            .client
            .post(self.send_message_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifierError::DeliveryFailed(e.without_url().to_string()))?;
        let status = response.status();
        let result = response.json::<BotApiResponse>().await.map_err(|e| NotifierError::DeliveryFailed(e.to_string()));
        match result {
            Ok(r) if status.is_success() && r.ok => {
                debug!("🩺️ Telegram alert delivered");
                Ok(())
            },
            Ok(r) => Err(NotifierError::DeliveryFailed(format!(
                "{status}. {}",
                r.description.unwrap_or_else(|| "No description".to_string())
            ))),
            Err(e) => Err(e),
        }
    }
}
