use std::time::Duration;

use chrono::Utc;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{
    db_types::OrderMetadata,
    providers::{ExchangeConfig, PaymentRequest, ProviderAdapterError},
    webhooks::hmac_sha512_hex,
};

pub const TIMESTAMP_HEADER: &str = "X-Exchange-Timestamp";
pub const NONCE_HEADER: &str = "X-Exchange-Nonce";
pub const CERTIFICATE_HEADER: &str = "X-Exchange-Certificate-SN";
pub const SIGNATURE_HEADER: &str = "X-Exchange-Signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderResponse {
    status: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    error_message: Option<String>,
    data: Option<CreateOrderData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderData {
    prepay_id: String,
    checkout_url: String,
}

/// Pay-with-exchange-balance orders. Requests are signed with the merchant API secret over
/// `timestamp\nnonce\nbody\n`, and the signature is sent as uppercase hex.
#[derive(Debug, Clone)]
pub struct ExchangeOrderAdapter {
    config: ExchangeConfig,
    client: Client,
}

pub fn sign_request(secret: &str, timestamp: i64, nonce: &str, body: &str) -> String {
    let payload = format!("{timestamp}\n{nonce}\n{body}\n");
    hmac_sha512_hex(secret.as_bytes(), payload.as_bytes()).to_uppercase()
}

impl ExchangeOrderAdapter {
    pub fn new(config: ExchangeConfig, timeout: Duration) -> Result<Self, ProviderAdapterError> {
        let client =
            Client::builder().timeout(timeout).build().map_err(|e| ProviderAdapterError::Initialization(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub async fn open_payment(&self, request: &PaymentRequest<'_>) -> Result<OrderMetadata, ProviderAdapterError> {
        let body = json!({
            "env": { "terminalType": "WEB" },
            "merchantTradeNo": request.reference,
            "orderAmount": request.quote.total.to_string(),
            "currency": request.quote.currency,
            "description": format!("{} subscription", request.tier),
            "goodsDetails": [{
                "goodsType": "02",
                "goodsCategory": "Z000",
                "referenceGoodsId": request.tier,
                "goodsName": format!("{} subscription", request.tier),
            }],
        })
        .to_string();
        let timestamp = Utc::now().timestamp_millis();
        let nonce = thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect::<String>();
        let signature = sign_request(self.config.api_secret.reveal(), timestamp, &nonce, &body);
        let url = format!("{}/v3/order", self.config.base_url.trim_end_matches('/'));
        debug!("🛒️ Creating exchange order for {}", request.order_id);
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .header(NONCE_HEADER, nonce)
            .header(CERTIFICATE_HEADER, self.config.api_key.reveal().as_str())
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!("🛒️ Exchange rejected order {}. {status}. {message}", request.order_id);
            return Err(ProviderAdapterError::Rejected { status: status.as_u16(), message });
        }
        let result = response
            .json::<CreateOrderResponse>()
            .await
            .map_err(|e| ProviderAdapterError::InvalidResponse(e.to_string()))?;
        if result.status != "SUCCESS" {
            let message = format!("{} {}", result.code, result.error_message.unwrap_or_default());
            return Err(ProviderAdapterError::Rejected { status: status.as_u16(), message });
        }
        let data = result
            .data
            .ok_or_else(|| ProviderAdapterError::InvalidResponse("No data in exchange response".to_string()))?;
        let mut metadata = OrderMetadata { checkout_url: Some(data.checkout_url), ..Default::default() };
        metadata.provider_data.insert("prepayId".to_string(), data.prepay_id);
        Ok(metadata)
    }
}

#[cfg(test)]
mod test {
    use spg_common::{MinorUnits, Secret};
    use wiremock::{
        matchers::{header_exists, method, path},
        Mock,
        MockServer,
        Request,
        ResponseTemplate,
    };

    use super::*;
    use crate::{
        db_types::{OrderId, Tier, UserId},
        pricing::Quote,
    };

    #[test]
    fn signature_covers_timestamp_nonce_and_body() {
        let a = sign_request("secret", 1_700_000_000_000, "nonce", "{}");
        let b = sign_request("secret", 1_700_000_000_001, "nonce", "{}");
        assert_ne!(a, b);
        assert_eq!(a.len(), 128);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn creates_signed_order() {
        let _ = env_logger::try_init();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/order"))
            .and(header_exists(SIGNATURE_HEADER))
            .and(header_exists(NONCE_HEADER))
            .and(|req: &Request| {
                let ts = req.headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
                let nonce = req.headers.get(NONCE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
                let sig = req.headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
                let body = String::from_utf8_lossy(&req.body);
                ts.parse::<i64>().map(|ts| sign_request("api-secret", ts, nonce, &body) == sig).unwrap_or(false)
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "SUCCESS",
                "code": "000000",
                "data": {"prepayId": "29383937493038367292", "checkoutUrl": "https://pay.example/checkout/abc"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        let config = ExchangeConfig {
            base_url: server.uri(),
            api_key: Secret::new("api-key".to_string()),
            api_secret: Secret::new("api-secret".to_string()),
        };
        let adapter = ExchangeOrderAdapter::new(config, Duration::from_secs(2)).unwrap();
        let order_id = OrderId::from("ord_x");
        let quote = Quote {
            currency: "USDT".into(),
            base: MinorUnits::from(700),
            fee: MinorUnits::from(0),
            total: MinorUnits::from(700),
        };
        let request = PaymentRequest {
            order_id: &order_id,
            user_id: UserId(1),
            tier: Tier::Plus,
            reference: "EXO0123456789ABCDEFGHJK",
            quote: &quote,
            phone: None,
            email: None,
        };
        let metadata = adapter.open_payment(&request).await.unwrap();
        assert_eq!(metadata.checkout_url.as_deref(), Some("https://pay.example/checkout/abc"));
        assert_eq!(metadata.provider_data.get("prepayId").map(String::as_str), Some("29383937493038367292"));
    }
}
