use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;
use spg_engine::MemoryStore;

use super::helpers::{authorized, components, create_till_order, json_body, send};

fn verify(order_id: &str, transaction_id: &str) -> TestRequest {
    authorized(TestRequest::post().uri("/admin/verify"))
        .set_json(json!({"orderId": order_id, "transactionId": transaction_id}))
}

#[actix_web::test]
async fn admin_routes_require_a_token() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    for req in [
        TestRequest::get().uri("/admin/pending"),
        TestRequest::post().uri("/admin/monitor/run"),
        TestRequest::post().uri("/admin/verify").set_json(json!({"orderId": "ord_x", "transactionId": "TX1"})),
    ] {
        let (status, _) = send(&gw, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[actix_web::test]
async fn manual_verification_is_idempotent() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    let order = create_till_order(&gw, 2001).await;
    let order_id = order["orderId"].as_str().unwrap();

    let (status, body) = send(&gw, verify(order_id, "TX123")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let first = json_body(&body);
    assert_eq!(first["success"], true);
    assert_eq!(first["outcome"], "activated");
    assert_eq!(first["transactionRef"], "TX123");

    let (status, body) = send(&gw, verify(order_id, "TX456")).await;
    assert_eq!(status, StatusCode::OK);
    let second = json_body(&body);
    assert_eq!(second["success"], true);
    assert_eq!(second["outcome"], "already_completed");
    assert_eq!(second["transactionRef"], "TX123");
    assert_eq!(second["subscriptionExpiry"], first["subscriptionExpiry"]);

    let uri = format!("/admin/order/{order_id}");
    let (status, body) = send(&gw, authorized(TestRequest::get().uri(&uri))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "completed");
}

#[actix_web::test]
async fn manual_verification_errors() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    let (status, body) = send(&gw, verify("ord_unknown", "TX123")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&body)["error"].as_str().unwrap().contains("ord_unknown"));

    let order = create_till_order(&gw, 2002).await;
    let (status, _) = send(&gw, verify(order["orderId"].as_str().unwrap(), "  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn pending_orders_are_listed() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    let first = create_till_order(&gw, 2003).await;
    let second = create_till_order(&gw, 2004).await;
    let (status, _) = send(&gw, verify(second["orderId"].as_str().unwrap(), "TX789")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&gw, authorized(TestRequest::get().uri("/admin/pending"))).await;
    assert_eq!(status, StatusCode::OK);
    let pending = json_body(&body);
    assert_eq!(pending["count"], 1);
    assert_eq!(pending["orders"][0]["orderId"], first["orderId"]);
    assert_eq!(pending["orders"][0]["status"], "pending");
}

#[actix_web::test]
async fn repair_needs_a_completed_order() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    let order = create_till_order(&gw, 2005).await;
    let order_id = order["orderId"].as_str().unwrap();
    let uri = format!("/admin/repair/{order_id}");

    let (status, _) = send(&gw, authorized(TestRequest::post().uri(&uri))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&gw, verify(order_id, "TX001")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&gw, authorized(TestRequest::post().uri(&uri))).await;
    assert_eq!(status, StatusCode::OK);
    let result = json_body(&body);
    assert_eq!(result["repaired"], false);
    assert_eq!(result["subscription"]["tier"], "PLUS");
}

#[actix_web::test]
async fn monitor_can_be_run_on_demand() {
    let _ = env_logger::try_init();
    let gw = components(MemoryStore::new());
    create_till_order(&gw, 2006).await;
    let (status, body) = send(&gw, authorized(TestRequest::post().uri("/admin/monitor/run"))).await;
    assert_eq!(status, StatusCode::OK);
    let report = json_body(&body);
    assert_eq!(report["missesToday"], 0);
    assert_eq!(report["staleOrders"].as_array().unwrap().len(), 0);
    assert_eq!(report["alertsSent"].as_array().unwrap().len(), 0);
}
