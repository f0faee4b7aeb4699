use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use spg_engine::MemoryStore;

use super::helpers::{authorized, components, create_till_order, json_body, send};

#[actix_web::test]
async fn health_needs_no_token() {
    let gw = components(MemoryStore::new());
    let (status, body) = send(&gw, TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn create_order_requires_a_token() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let order = json!({"userId": 1001, "tier": "PLUS", "method": "MOBILE_MONEY_TILL", "region": "KE", "phone": "0712345678"});

    let (status, body) = send(&gw, TestRequest::post().uri("/api/orders").set_json(&order)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("bearer token is required"));

    let wrong = TestRequest::post().uri("/api/orders").insert_header(("Authorization", "Bearer guess")).set_json(&order);
    let (status, _) = send(&gw, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(gw.store.is_empty());
}

#[actix_web::test]
async fn create_order_returns_instructions() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let order = create_till_order(&gw, 1001).await;
    assert_eq!(order["status"], "pending");
    assert_eq!(order["userId"], 1001);
    assert_eq!(order["tier"], "PLUS");
    let instructions = &order["metadata"]["instructions"];
    assert_eq!(instructions["type"], "TILL");
    assert_eq!(instructions["tillNumber"], "522533");

    let uri = format!("/api/orders/{}", order["orderId"].as_str().unwrap());
    let (status, body) = send(&gw, authorized(TestRequest::get().uri(&uri))).await;
    assert_eq!(status, StatusCode::OK);
    let fetched = json_body(&body);
    assert_eq!(fetched["orderId"], order["orderId"]);
    assert_eq!(fetched["effectiveStatus"], "pending");
}

#[actix_web::test]
async fn invalid_orders_are_rejected() {
    let _ = env_logger::try_init().ok();
    let gw = components(MemoryStore::new());
    let cases = [
        (json!({"userId": 1, "tier": "GOLD", "method": "CRYPTO_INVOICE", "region": "KE"}), "Unknown subscription tier"),
        (json!({"userId": 1, "tier": "PLUS", "method": "MOBILE_MONEY_TILL", "region": "KE"}), "requires a phone number"),
        (json!({"userId": 1, "tier": "PLUS", "method": "MOBILE_MONEY_TILL", "region": "NG", "phone": "08031234567"}), "not offered"),
        (json!({"userId": 1, "tier": "PLUS", "method": "CARD_CHECKOUT", "region": "KE", "email": "a@b.co"}), "not configured"),
    ];
    for (order, expected) in cases {
        let (status, body) = send(&gw, authorized(TestRequest::post().uri("/api/orders")).set_json(&order)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{order}");
        let error = json_body(&body)["error"].as_str().unwrap().to_string();
        assert!(error.contains(expected), "'{error}' does not mention '{expected}'");
    }
    assert!(gw.store.is_empty());
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let gw = components(MemoryStore::new());
    let (status, _) = send(&gw, authorized(TestRequest::get().uri("/api/orders/ord_missing"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
