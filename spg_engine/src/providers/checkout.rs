use std::time::Duration;

use log::*;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    db_types::OrderMetadata,
    providers::{CheckoutConfig, PaymentRequest, ProviderAdapterError},
};

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    #[serde(default)]
    access_code: Option<String>,
}

/// Hosted card checkout. The provider returns a URL the customer is redirected to; the outcome arrives later by
/// webhook, keyed on the reference we supply here.
#[derive(Debug, Clone)]
pub struct CardCheckoutAdapter {
    config: CheckoutConfig,
    client: Client,
}

impl CardCheckoutAdapter {
    pub fn new(config: CheckoutConfig, timeout: Duration) -> Result<Self, ProviderAdapterError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| ProviderAdapterError::Initialization(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub async fn open_payment(&self, request: &PaymentRequest<'_>) -> Result<OrderMetadata, ProviderAdapterError> {
        let mut body = json!({
            "email": request.email.unwrap_or_default(),
            "amount": request.quote.total.value(),
            "currency": request.quote.currency,
            "reference": request.reference,
            "metadata": {
                "orderId": request.order_id,
                "userId": request.user_id,
                "tier": request.tier,
            },
        });
        if let Some(callback) = &self.config.callback_url {
            body["callback_url"] = json!(callback);
        }
        debug!("🛒️ Initializing card checkout for order {}", request.order_id);
        let response = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(self.config.secret_key.reveal())
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("🛒️ Card checkout rejected order {}. {status}. {message}", request.order_id);
            return Err(ProviderAdapterError::Rejected { status: status.as_u16(), message });
        }
        let result = response
            .json::<InitializeResponse>()
            .await
            .map_err(|e| ProviderAdapterError::InvalidResponse(e.to_string()))?;
        if !result.status {
            return Err(ProviderAdapterError::Rejected { status: status.as_u16(), message: result.message });
        }
        let data = result
            .data
            .ok_or_else(|| ProviderAdapterError::InvalidResponse("No data in checkout response".to_string()))?;
        let mut metadata = OrderMetadata { checkout_url: Some(data.authorization_url), ..Default::default() };
        if let Some(code) = data.access_code {
            metadata.provider_data.insert("accessCode".to_string(), code);
        }
        Ok(metadata)
    }
}
