#![allow(dead_code)]
use serde_json::json;
use spg_engine::{
    db_types::{Order, PaymentMethod, Region, Tier, UserId},
    events::EventProducers,
    keys::KeySchema,
    order_objects::NewOrderRequest,
    pricing::PriceTable,
    providers::{CryptoConfig, ProviderAdapters, ProvidersConfig, TillConfig},
    traits::KeyValueStore,
    webhooks::{SignatureVerifier, WebhookSecrets},
    ActivationApi,
    OrderFlowApi,
    WebhookApi,
};

pub const TILL_NUMBER: &str = "522533";
pub const DEPOSIT_ADDRESS: &str = "TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE";

pub struct Gateway<S> {
    pub store: S,
    pub keys: KeySchema,
    pub orders: OrderFlowApi<S>,
    pub webhooks: WebhookApi<S>,
}

impl<S: KeyValueStore> Gateway<S> {
    pub fn activation(&self) -> &ActivationApi<S> {
        self.webhooks.activation()
    }

    pub async fn place_till_order(&self, user_id: i64) -> Order {
        self.orders.create_order(till_request(user_id)).await.expect("Error creating till order")
    }

    pub async fn place_crypto_order(&self, user_id: i64) -> Order {
        self.orders.create_order(crypto_request(user_id)).await.expect("Error creating crypto order")
    }
}

pub fn adapters() -> ProviderAdapters {
    let config = ProvidersConfig {
        till: Some(TillConfig { till_number: TILL_NUMBER.into(), business_name: "Tipster Pro".into() }),
        crypto: Some(CryptoConfig { deposit_address: DEPOSIT_ADDRESS.into(), network: "TRC20".into() }),
        ..Default::default()
    };
    ProviderAdapters::new(config).expect("Error creating adapters")
}

pub fn gateway<S: KeyValueStore>(store: S) -> Gateway<S> {
    gateway_with(store, WebhookSecrets::default(), EventProducers::default())
}

pub fn gateway_with<S: KeyValueStore>(store: S, secrets: WebhookSecrets, producers: EventProducers) -> Gateway<S> {
    let keys = KeySchema::default();
    let orders = OrderFlowApi::new(store.clone(), keys.clone(), PriceTable::default(), adapters());
    let activation = ActivationApi::new(store.clone(), keys.clone(), producers);
    let webhooks = WebhookApi::new(SignatureVerifier::new(secrets), activation);
    Gateway { store, keys, orders, webhooks }
}

pub fn till_request(user_id: i64) -> NewOrderRequest {
    NewOrderRequest::new(UserId(user_id), Tier::Plus, PaymentMethod::MobileMoneyTill, Region::Ke)
        .with_phone("+254712345678")
}

pub fn crypto_request(user_id: i64) -> NewOrderRequest {
    NewOrderRequest::new(UserId(user_id), Tier::Basic, PaymentMethod::CryptoInvoice, Region::Intl)
}

pub fn till_callback(reference: &str, transaction_id: &str, amount: &str, msisdn: &str) -> Vec<u8> {
    json!({
        "TransactionType": "Pay Bill",
        "TransID": transaction_id,
        "TransTime": "20241001120000",
        "TransAmount": amount,
        "BusinessShortCode": TILL_NUMBER,
        "BillRefNumber": reference,
        "MSISDN": msisdn,
        "FirstName": "Jane"
    })
    .to_string()
    .into_bytes()
}

pub fn invoice_callback(reference: &str, status: &str, tx_hash: Option<&str>, amount: &str) -> Vec<u8> {
    json!({
        "invoiceRef": reference,
        "status": status,
        "txHash": tx_hash,
        "amount": amount,
        "currency": "USDT"
    })
    .to_string()
    .into_bytes()
}
