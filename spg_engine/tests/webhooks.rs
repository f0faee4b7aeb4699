use chrono::Utc;
use spg_engine::{
    db_types::{OrderStatusType, PaymentMethod},
    events::EventProducers,
    order_objects::ActivationOutcome,
    records::counters,
    spg_api::webhook_objects::IngestOutcome,
    test_utils::FlakyStore,
    webhooks::{sign_payload, SignatureError, WebhookSecrets},
    MemoryStore,
};

mod support;
use support::*;

const TILL: PaymentMethod = PaymentMethod::MobileMoneyTill;
const CRYPTO: PaymentMethod = PaymentMethod::CryptoInvoice;

#[tokio::test]
async fn unmatched_callback_counts_one_mapping_miss() {
    let _ = env_logger::try_init();
    let gw = gateway(MemoryStore::new());
    let order = gw.place_crypto_order(1).await;
    let body = invoice_callback("INV-NOSUCHINVOICE", "paid", Some("0xabc"), "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &body).await;
    assert!(matches!(outcome, IngestOutcome::MappingMiss { misses_today: 1, .. }), "{outcome:?}");
    let today = Utc::now().date_naive();
    assert_eq!(counters::mapping_misses(&gw.store, &gw.keys, today).await.unwrap(), 1);
    let untouched = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(untouched, order);
}

#[tokio::test]
async fn till_payment_activates_by_reference() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_till_order(1001).await;
    let body = till_callback(&order.provider_ref.to_lowercase(), "QK71ABC123", "500.00", "254700000001");
    let outcome = gw.webhooks.ingest(TILL, None, &body).await;
    match &outcome {
        IngestOutcome::Activated(result) => {
            assert_eq!(result.outcome, ActivationOutcome::Activated);
            assert_eq!(result.order_id, order.order_id);
            assert_eq!(result.transaction_ref.as_deref(), Some("QK71ABC123"));
        },
        other => panic!("Expected activation, got {other:?}"),
    }
    assert_eq!(outcome.label(), "activated");

    let repeat = gw.webhooks.ingest(TILL, None, &body).await;
    assert_eq!(repeat.label(), "already_completed");
    assert!(repeat.ack().received);
}

#[tokio::test]
async fn till_reference_is_found_among_other_words() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_till_order(1003).await;
    let account = format!("payments {} account1", order.provider_ref.to_lowercase());
    let body = till_callback(&account, "QK71WORDS1", "500.00", "254700000001");
    let outcome = gw.webhooks.ingest(TILL, None, &body).await;
    assert_eq!(outcome.label(), "activated", "{outcome:?}");
    assert_eq!(outcome.order_id(), Some(&order.order_id));
}

#[tokio::test]
async fn till_payment_falls_back_to_phone() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_till_order(2002).await;
    let body = till_callback("typo", "QK71XYZ999", "500.00", "+254 712 345 678");
    let outcome = gw.webhooks.ingest(TILL, None, &body).await;
    assert_eq!(outcome.order_id(), Some(&order.order_id));
    assert_eq!(outcome.label(), "activated");
}

#[tokio::test]
async fn phone_fallback_is_only_for_mobile_money() {
    let gw = gateway(MemoryStore::new());
    let _till = gw.place_till_order(2003).await;
    let body = invoice_callback("INV-UNKNOWNREF22", "paid", Some("0xdef"), "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &body).await;
    assert_eq!(outcome.label(), "mapping_miss");
}

#[tokio::test]
async fn non_final_and_failed_statuses() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_crypto_order(5).await;
    let waiting = invoice_callback(&order.provider_ref, "confirming", None, "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &waiting).await;
    assert!(matches!(outcome, IngestOutcome::Ignored { .. }));
    let pending = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(pending.status, OrderStatusType::Pending);

    let expired = invoice_callback(&order.provider_ref, "expired", None, "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &expired).await;
    assert!(matches!(outcome, IngestOutcome::Declined { ref order_id, .. } if order_id == &order.order_id));
    let failed = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);

    let late = invoice_callback(&order.provider_ref, "paid", Some("0xlate"), "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &late).await;
    assert!(matches!(outcome, IngestOutcome::NotActivatable { status: OrderStatusType::Failed, .. }));
}

#[tokio::test]
async fn underpayment_is_not_activated() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_crypto_order(6).await;
    let short = invoice_callback(&order.provider_ref, "paid", Some("0xshort"), "2.50");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &short).await;
    match outcome {
        IngestOutcome::Underpaid { expected, received, .. } => {
            assert_eq!(expected.value(), 300);
            assert_eq!(received.value(), 250);
        },
        other => panic!("Expected underpayment, got {other:?}"),
    }
    let pending = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(pending.status, OrderStatusType::Pending);

    let full = invoice_callback(&order.provider_ref, "paid", Some("0xfull"), "3.00");
    assert_eq!(gw.webhooks.ingest(CRYPTO, None, &full).await.label(), "activated");
}

#[tokio::test]
async fn six_decimal_crypto_amounts_settle() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_crypto_order(61).await;
    let body = invoice_callback(&order.provider_ref, "finished", Some("0xabc"), "3.000000");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &body).await;
    assert_eq!(outcome.label(), "activated", "{outcome:?}");

    let short = gw.place_crypto_order(62).await;
    let body = invoice_callback(&short.provider_ref, "finished", Some("0xdef"), "2.999999");
    match gw.webhooks.ingest(CRYPTO, None, &body).await {
        IngestOutcome::Underpaid { received, .. } => assert_eq!(received.value(), 299),
        other => panic!("Expected underpayment, got {other:?}"),
    }
}

#[tokio::test]
async fn oversized_amount_is_malformed() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_till_order(63).await;
    let body = till_callback(&order.provider_ref, "TXBIG", "99999999999999999", "254712345678");
    let outcome = gw.webhooks.ingest(TILL, None, &body).await;
    assert!(matches!(outcome, IngestOutcome::Malformed(_)), "{outcome:?}");
    let pending = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(pending.status, OrderStatusType::Pending);
}

#[tokio::test]
async fn signatures_are_enforced_when_configured() {
    let _ = env_logger::try_init();
    let secrets = WebhookSecrets::default().with_secret(TILL, "till-secret");
    let gw = gateway_with(MemoryStore::new(), secrets, EventProducers::default());
    let order = gw.place_till_order(77).await;
    let body = till_callback(&order.provider_ref, "QK71SIGNED", "500.00", "254712345678");

    let outcome = gw.webhooks.ingest(TILL, None, &body).await;
    assert!(matches!(outcome, IngestOutcome::SignatureInvalid(SignatureError::Missing(_))));
    let forged = sign_payload(TILL, "wrong-secret", &body);
    let outcome = gw.webhooks.ingest(TILL, Some(&forged), &body).await;
    assert!(matches!(outcome, IngestOutcome::SignatureInvalid(SignatureError::Mismatch)));
    assert!(!outcome.ack().received);
    let still_pending = gw.orders.fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(still_pending.status, OrderStatusType::Pending);

    let signature = sign_payload(TILL, "till-secret", &body);
    let outcome = gw.webhooks.ingest(TILL, Some(&signature), &body).await;
    assert_eq!(outcome.label(), "activated");

    // Rails without a secret stay permissive.
    let crypto = gw.place_crypto_order(78).await;
    let body = invoice_callback(&crypto.provider_ref, "paid", Some("0xopen"), "3.00");
    assert_eq!(gw.webhooks.ingest(CRYPTO, None, &body).await.label(), "activated");
}

#[tokio::test]
async fn garbage_is_malformed() {
    let gw = gateway(MemoryStore::new());
    let outcome = gw.webhooks.ingest(TILL, None, b"not json").await;
    assert!(matches!(outcome, IngestOutcome::Malformed(_)));
    let outcome = gw.webhooks.ingest(CRYPTO, None, br#"{"invoiceRef":"INV-ABCDEFGHJKLM","status":"paid"}"#).await;
    assert!(matches!(outcome, IngestOutcome::Malformed(_)));
}

#[tokio::test]
async fn store_outage_is_an_infra_error() {
    let store = FlakyStore::new(MemoryStore::new());
    let gw = gateway(store.clone());
    let order = gw.place_crypto_order(9).await;
    store.fail_everything_on("ref:");
    let body = invoice_callback(&order.provider_ref, "paid", Some("0xdown"), "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &body).await;
    assert!(matches!(outcome, IngestOutcome::InfraError(_)));
    store.heal();
    assert_eq!(gw.webhooks.ingest(CRYPTO, None, &body).await.label(), "activated");
}

#[tokio::test]
async fn unwritten_subscription_is_reported() {
    let store = FlakyStore::new(MemoryStore::new());
    let gw = gateway(store.clone());
    let order = gw.place_crypto_order(10).await;
    store.fail_writes_to("user:");
    let body = invoice_callback(&order.provider_ref, "paid", Some("0xhalf"), "3.00");
    let outcome = gw.webhooks.ingest(CRYPTO, None, &body).await;
    assert!(matches!(outcome, IngestOutcome::SubscriptionNotExtended { ref order_id } if order_id == &order.order_id));
    assert!(!outcome.ack().received);
}
