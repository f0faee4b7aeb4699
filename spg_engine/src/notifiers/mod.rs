//! Alert channels for the health monitor.
mod telegram;

use log::*;
pub use telegram::{TelegramConfig, TelegramNotifier, DEFAULT_TELEGRAM_API};

use crate::traits::{Alert, AlertNotifier, NotifierError};

/// Writes alerts to the log. Used when no external channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl AlertNotifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError> {
        warn!("🩺️ ALERT [{}] {}", alert.condition, alert.message);
        Ok(())
    }
}

/// The alert channel chosen at startup.
#[derive(Debug, Clone)]
pub enum ConfiguredNotifier {
    Log(LogNotifier),
    Telegram(TelegramNotifier),
}

impl ConfiguredNotifier {
    /// Telegram if a config is given, otherwise the log.
    pub fn new(telegram: Option<TelegramConfig>) -> Result<Self, NotifierError> {
        match telegram {
            Some(config) => Ok(Self::Telegram(TelegramNotifier::new(config)?)),
            None => {
                info!("🩺️ No alert channel configured. Alerts will only be logged.");
                Ok(Self::Log(LogNotifier))
            },
        }
    }
}

impl AlertNotifier for ConfiguredNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError> {
        match self {
            Self::Log(n) => n.notify(alert).await,
            Self::Telegram(n) => n.notify(alert).await,
        }
    }
}
