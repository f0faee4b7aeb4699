use actix_web::{http::StatusCode, test::TestRequest};
use spg_engine::{
    db_types::PaymentMethod,
    test_utils::FlakyStore,
    webhooks::{sign_payload, WebhookSecrets},
    MemoryStore,
};

use super::helpers::{
    components,
    components_with_secrets,
    create_till_order,
    invoice_callback,
    json_body,
    send,
    till_callback,
};

fn callback(uri: &str, body: String) -> TestRequest {
    TestRequest::post().uri(uri).insert_header(("Content-Type", "application/json")).set_payload(body)
}

#[actix_web::test]
async fn till_payment_activates_once() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let order = create_till_order(&gw, 1001).await;
    let reference = order["providerRef"].as_str().expect("No provider reference");

    let (status, body) = send(&gw, callback("/webhook/mobile-money", till_callback(reference, "QK71ABC123", "500.00"))).await;
    assert_eq!(status, StatusCode::OK);
    let ack = json_body(&body);
    assert_eq!(ack["outcome"], "activated");
    assert_eq!(ack["orderId"], order["orderId"]);

    let (status, body) = send(&gw, callback("/webhook/mobile-money", till_callback(reference, "QK71XYZ999", "500.00"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["outcome"], "already_completed");
}

#[actix_web::test]
async fn unmatched_callbacks_are_acknowledged_per_rail() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let (status, body) = send(&gw, callback("/webhook/mobile-money", till_callback("ZZZZ9999", "QK71NOPE00", "500.00"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["outcome"], "mapping_miss");

    let payload = invoice_callback("INV-AAAABBBBCCCC", "paid", "0x01", "3.00");
    let (status, body) = send(&gw, callback("/webhook/crypto", payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["outcome"], "mapping_miss");
}

#[actix_web::test]
async fn signed_rails_reject_unsigned_callbacks() {
    let _ = env_logger::try_init().ok();
    let secrets = WebhookSecrets::default().with_secret(PaymentMethod::CryptoInvoice, "invoice-secret");
    let gw = components_with_secrets(MemoryStore::new(), secrets);
    let payload = invoice_callback("INV-AAAABBBBCCCC", "paid", "0x01", "3.00");

    let (status, body) = send(&gw, callback("/webhook/crypto", payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let ack = json_body(&body);
    assert_eq!(ack["received"], false);
    assert_eq!(ack["outcome"], "signature_invalid");

    let forged = callback("/webhook/crypto", payload.clone()).insert_header(("X-Invoice-Signature", "00ff"));
    let (status, _) = send(&gw, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = sign_payload(PaymentMethod::CryptoInvoice, "invoice-secret", payload.as_bytes());
    let signed = callback("/webhook/crypto", payload).insert_header(("X-Invoice-Signature", signature));
    let (status, body) = send(&gw, signed).await;
    // Authentic, but there is no such invoice
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["outcome"], "mapping_miss");
}

#[actix_web::test]
async fn malformed_callbacks_are_bad_requests() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let (status, body) = send(&gw, callback("/webhook/crypto", "{not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["outcome"], "malformed");
}

#[actix_web::test]
async fn store_outage_asks_the_provider_to_retry() {
    let _ = env_logger::try_init().ok();
    let store = FlakyStore::new(MemoryStore::new());
    let gw = components(store.clone());
    let order = create_till_order(&gw, 1002).await;
    let reference = order["providerRef"].as_str().expect("No provider reference").to_string();
    store.fail_everything_on("");

    let (status, body) = send(&gw, callback("/webhook/mobile-money", till_callback(&reference, "QK71ABC124", "500.00"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["received"], false);

    store.heal();
    let (status, body) = send(&gw, callback("/webhook/mobile-money", till_callback(&reference, "QK71ABC124", "500.00"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["outcome"], "activated");
}
