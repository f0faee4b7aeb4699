use std::time::Duration;

use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, App};
use log::debug;
use serde_json::{json, Value};
use spg_common::Secret;
use spg_engine::{
    events::EventProducers,
    keys::KeySchema,
    notifiers::LogNotifier,
    pricing::PriceTable,
    providers::{CryptoConfig, ProviderAdapters, ProvidersConfig, TillConfig},
    spg_api::monitor_objects::MonitorConfig,
    traits::KeyValueStore,
    webhooks::{SignatureVerifier, WebhookSecrets},
};

use crate::{config::ServerOptions, server::GatewayComponents};

pub const ADMIN_TOKEN: &str = "3c1bd1ad-admin-token";

pub fn components<S: KeyValueStore>(store: S) -> GatewayComponents<S, LogNotifier> {
    components_with_secrets(store, WebhookSecrets::default())
}

pub fn components_with_secrets<S: KeyValueStore>(store: S, secrets: WebhookSecrets) -> GatewayComponents<S, LogNotifier> {
    let providers = ProvidersConfig {
        till: Some(TillConfig { till_number: "522533".into(), business_name: "Tipster Pro".into() }),
        crypto: Some(CryptoConfig { deposit_address: "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE".into(), network: "TRC20".into() }),
        ..Default::default()
    };
    GatewayComponents {
        store,
        keys: KeySchema::default(),
        prices: PriceTable::default(),
        adapters: ProviderAdapters::new(providers).expect("Error creating adapters"),
        verifier: SignatureVerifier::new(secrets),
        notifier: LogNotifier,
        producers: EventProducers::default(),
        order_ttl: Duration::from_secs(900),
        completed_retention: Duration::from_secs(86_400),
        monitor: MonitorConfig::default(),
        options: ServerOptions::default(),
        admin_tokens: vec![Secret::new(ADMIN_TOKEN.to_string())],
    }
}

/// Sends the request through a freshly built app and returns the status and body. Errors raised by middleware are
/// rendered the same way the server would render them.
pub async fn send<S: KeyValueStore + 'static>(
    components: &GatewayComponents<S, LogNotifier>,
    req: TestRequest,
) -> (StatusCode, String) {
    let app = App::new().configure(|cfg| components.configure(cfg));
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => res.into_parts().1,
        Err(e) => e.error_response(),
    };
    let status = res.status();
    let bytes = to_bytes(res.into_body()).await.expect("Error reading body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

pub fn authorized(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {ADMIN_TOKEN}")))
}

pub fn json_body(body: &str) -> Value {
    serde_json::from_str(body).expect("Response was not JSON")
}

/// Creates a mobile money order through the API and returns its JSON.
pub async fn create_till_order<S: KeyValueStore + 'static>(
    components: &GatewayComponents<S, LogNotifier>,
    user_id: i64,
) -> Value {
    let req = authorized(TestRequest::post().uri("/api/orders")).set_json(json!({
        "userId": user_id,
        "tier": "PLUS",
        "method": "MOBILE_MONEY_TILL",
        "region": "KE",
        "phone": "+254712345678"
    }));
    let (status, body) = send(components, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json_body(&body)
}

pub fn till_callback(reference: &str, transaction_id: &str, amount: &str) -> String {
    json!({
        "TransactionType": "Pay Bill",
        "TransID": transaction_id,
        "TransTime": "20241001120000",
        "TransAmount": amount,
        "BusinessShortCode": "522533",
        "BillRefNumber": reference,
        "MSISDN": "254712345678",
        "FirstName": "Jane"
    })
    .to_string()
}

pub fn invoice_callback(reference: &str, status: &str, tx_hash: &str, amount: &str) -> String {
    json!({ "invoiceRef": reference, "status": status, "txHash": tx_hash, "amount": amount, "currency": "USDT" })
        .to_string()
}
