use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spg_api::monitor_objects::AlertCondition;

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("The alert channel is not configured. {0}")]
    NotConfigured(String),
    #[error("Could not deliver the alert. {0}")]
    DeliveryFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub condition: AlertCondition,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new<S: Into<String>>(condition: AlertCondition, message: S) -> Self {
        Self { condition, message: message.into(), raised_at: Utc::now() }
    }
}

/// Delivers health alerts to operators.
#[allow(async_fn_in_trait)]
pub trait AlertNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifierError>;
}
