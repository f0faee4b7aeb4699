use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::future::join_all;
use spg_engine::{
    db_types::{OrderId, OrderStatusType, Tier, UserId},
    events::{EventHandler, EventProducers, SubscriptionActivatedEvent},
    order_objects::{ActivationOutcome, DeclineOutcome},
    records::indices,
    test_utils::FlakyStore,
    webhooks::WebhookSecrets,
    ActivationError,
    MemoryStore,
};

mod support;
use support::*;

#[tokio::test]
async fn activation_extends_subscription_once() {
    let _ = env_logger::try_init();
    let gw = gateway(MemoryStore::new());
    let order = gw.place_till_order(1001).await;

    let first = gw.activation().activate(&order.order_id, "TX123").await.unwrap();
    assert!(first.success);
    assert_eq!(first.outcome, ActivationOutcome::Activated);
    assert_eq!(first.transaction_ref.as_deref(), Some("TX123"));
    let subscription = gw.activation().fetch_subscription(UserId(1001)).await.unwrap().unwrap();
    assert_eq!(subscription.tier, Tier::Plus);
    assert!(subscription.subscription_expiry > chrono::Utc::now() + chrono::Duration::days(29));
    assert_eq!(Some(subscription.subscription_expiry), first.subscription_expiry);

    let second = gw.activation().activate(&order.order_id, "TX999").await.unwrap();
    assert!(second.success);
    assert_eq!(second.outcome, ActivationOutcome::AlreadyCompleted);
    assert_eq!(second.transaction_ref.as_deref(), Some("TX123"));
    assert_eq!(second.completed_at, first.completed_at);
    let after = gw.activation().fetch_subscription(UserId(1001)).await.unwrap().unwrap();
    assert_eq!(after, subscription);

    let stored = gw.activation().fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Completed);
    assert_eq!(stored.transaction_ref.as_deref(), Some("TX123"));
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let gw = gateway(MemoryStore::new());
    let err = gw.activation().activate(&OrderId::from("ord_missing"), "TX1").await.unwrap_err();
    assert!(matches!(err, ActivationError::OrderNotFound(_)));
}

#[tokio::test]
async fn racing_activations_publish_one_event() {
    let _ = env_logger::try_init();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let handler = EventHandler::new(
        16,
        Arc::new(move |ev: SubscriptionActivatedEvent| {
            let seen = seen.clone();
            Box::pin(async move {
                assert_eq!(ev.order.order_id, ev.subscription.last_order_id.clone().unwrap());
                seen.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        }),
    );
    let producers =
        EventProducers { subscription_activated_producer: vec![handler.subscribe()], ..Default::default() };
    let store = FlakyStore::new(MemoryStore::new());
    let gw = gateway_with(store, WebhookSecrets::default(), producers);
    let order = gw.place_crypto_order(55).await;

    let calls = (0..10).map(|i| {
        let tx = format!("0xtx{i}");
        let activation = gw.activation();
        let order_id = order.order_id.clone();
        async move { activation.activate(&order_id, &tx).await }
    });
    let results = join_all(calls).await.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
    let winners = results.iter().filter(|r| r.outcome == ActivationOutcome::Activated).count();
    assert_eq!(winners, 1);
    assert!(results.iter().all(|r| r.success));
    let expiries = results.iter().map(|r| r.subscription_expiry).collect::<std::collections::HashSet<_>>();
    assert_eq!(expiries.len(), 1);

    drop(gw);
    handler.start_handler().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn terminal_states_never_move() {
    let gw = gateway(MemoryStore::new());
    let declined = gw.place_crypto_order(3).await;
    let outcome = gw.activation().decline(&declined.order_id, "expired on chain").await.unwrap();
    let failed = match outcome {
        DeclineOutcome::Declined(order) => order,
        other => panic!("Expected a decline, got {other:?}"),
    };
    assert_eq!(failed.status, OrderStatusType::Failed);
    assert_eq!(failed.metadata.decline_reason.as_deref(), Some("expired on chain"));
    let err = gw.activation().activate(&declined.order_id, "0xlate").await.unwrap_err();
    assert!(matches!(err, ActivationError::NotActivatable { status: OrderStatusType::Failed, .. }));

    let paid = gw.place_crypto_order(4).await;
    gw.activation().activate(&paid.order_id, "0xpaid").await.unwrap();
    let outcome = gw.activation().decline(&paid.order_id, "late decline").await.unwrap();
    assert!(matches!(outcome, DeclineOutcome::AlreadyFinal(ref o) if o.status == OrderStatusType::Completed));
    let stored = gw.activation().fetch_order(&paid.order_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatusType::Completed);
    assert!(gw.activation().fetch_subscription(UserId(3)).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_subscription_write_is_surfaced_and_repairable() {
    let _ = env_logger::try_init();
    let store = FlakyStore::new(MemoryStore::new());
    let gw = gateway(store.clone());
    let order = gw.place_till_order(808).await;

    store.fail_writes_to("user:");
    let err = gw.activation().activate(&order.order_id, "TXFAIL").await.unwrap_err();
    assert!(matches!(err, ActivationError::SubscriptionNotExtended { user_id: UserId(808), .. }));
    store.heal();

    let completed = gw.activation().fetch_order(&order.order_id).await.unwrap().unwrap();
    assert_eq!(completed.status, OrderStatusType::Completed);
    assert!(!gw.activation().subscription_reflects(&completed).await.unwrap());
    // A repeat delivery is an idempotent no-op and does not touch the user record.
    let repeat = gw.activation().activate(&order.order_id, "TXFAIL").await.unwrap();
    assert_eq!(repeat.outcome, ActivationOutcome::AlreadyCompleted);
    assert!(gw.activation().fetch_subscription(UserId(808)).await.unwrap().is_none());

    let repaired = gw.activation().repair_subscription(&order.order_id).await.unwrap();
    assert!(repaired.repaired);
    let subscription = repaired.subscription.unwrap();
    assert_eq!(Some(subscription.subscription_expiry), completed.entitlement_expiry());
    let again = gw.activation().repair_subscription(&order.order_id).await.unwrap();
    assert!(!again.repaired);
    assert_eq!(again.subscription.unwrap().subscription_expiry, subscription.subscription_expiry);
    assert!(gw.activation().subscription_reflects(&completed).await.unwrap());
}

#[tokio::test]
async fn repair_needs_a_completed_order() {
    let gw = gateway(MemoryStore::new());
    let order = gw.place_crypto_order(12).await;
    let err = gw.activation().repair_subscription(&order.order_id).await.unwrap_err();
    assert!(matches!(err, ActivationError::NotActivatable { status: OrderStatusType::Pending, .. }));
}

#[tokio::test]
async fn completed_orders_outlive_the_order_ttl() {
    let store = MemoryStore::new();
    let mut gw = gateway(store.clone());
    gw.orders = gw.orders.with_order_ttl(Duration::from_millis(80));
    let order = gw.place_till_order(31).await;
    gw.activation().activate(&order.order_id, "TXKEEP").await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let kept = gw.activation().fetch_order(&order.order_id).await.unwrap();
    assert!(kept.is_some());
    let by_ref = indices::resolve_provider_ref(&store, &gw.keys, order.payment_method, &order.provider_ref).await;
    assert_eq!(by_ref.unwrap(), Some(order.order_id.clone()));
    let repeat = gw.activation().activate(&order.order_id, "TXKEEP").await.unwrap();
    assert_eq!(repeat.outcome, ActivationOutcome::AlreadyCompleted);
}
