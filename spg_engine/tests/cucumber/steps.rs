use chrono::Utc;
use cucumber::{then, when};
use spg_engine::{
    db_types::{OrderStatusType, PaymentInstructions, PaymentMethod, Region, Tier, UserId},
    order_objects::NewOrderRequest,
    records::counters,
};

use crate::{
    cucumber::SubscriptionWorld,
    support::{invoice_callback, till_callback},
};

async fn place_order(world: &mut SubscriptionWorld, request: NewOrderRequest) {
    match world.gateway().orders.create_order(request).await {
        Ok(order) => {
            world.order = Some(order);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e.to_string()),
    }
}

#[when(expr = "user {int} orders {word} with {word} in {word}")]
async fn order_without_contact(world: &mut SubscriptionWorld, user: i64, tier: Tier, method: PaymentMethod, region: Region) {
    place_order(world, NewOrderRequest::new(UserId(user), tier, method, region)).await;
}

#[when(expr = "user {int} orders {word} with {word} in {word} using phone {word}")]
async fn order_with_phone(
    world: &mut SubscriptionWorld,
    user: i64,
    tier: Tier,
    method: PaymentMethod,
    region: Region,
    phone: String,
) {
    place_order(world, NewOrderRequest::new(UserId(user), tier, method, region).with_phone(phone)).await;
}

#[then(expr = "the order is {word}")]
async fn order_status(world: &mut SubscriptionWorld, status: OrderStatusType) {
    let order_id = world.order().order_id.clone();
    let order = world.gateway().orders.fetch_order(&order_id).await.expect("Error fetching order");
    let order = order.expect("The order no longer exists");
    assert_eq!(order.effective_status(Utc::now()), status);
}

#[then("the order has till instructions")]
async fn till_instructions(world: &mut SubscriptionWorld) {
    let order = world.order();
    match &order.metadata.instructions {
        Some(PaymentInstructions::Till(till)) => assert_eq!(till.account_reference, order.provider_ref),
        other => panic!("Expected till instructions, got {other:?}"),
    }
}

#[then(expr = "the order is rejected with {string}")]
async fn order_rejected(world: &mut SubscriptionWorld, message: String) {
    let error = world.last_error.as_ref().expect("The order was accepted");
    assert!(error.contains(&message), "'{error}' does not mention '{message}'");
}

#[when(expr = "the till provider confirms the order with transaction {word} for {word}")]
async fn till_confirms(world: &mut SubscriptionWorld, transaction: String, amount: String) {
    let body = till_callback(&world.order().provider_ref, &transaction, &amount, "254712345678");
    let outcome = world.gateway().webhooks.ingest(PaymentMethod::MobileMoneyTill, None, &body).await;
    world.last_callback = Some(outcome);
}

#[when(expr = "the crypto provider reports the order as {word} with transaction {word} for {word}")]
async fn crypto_reports_order(world: &mut SubscriptionWorld, status: String, transaction: String, amount: String) {
    let reference = world.order().provider_ref.clone();
    send_invoice_callback(world, &reference, &status, &transaction, &amount).await;
}

#[when(expr = "the crypto provider reports invoice {word} as {word} with transaction {word} for {word}")]
async fn crypto_reports(world: &mut SubscriptionWorld, invoice: String, status: String, transaction: String, amount: String) {
    send_invoice_callback(world, &invoice, &status, &transaction, &amount).await;
}

async fn send_invoice_callback(world: &mut SubscriptionWorld, invoice: &str, status: &str, transaction: &str, amount: &str) {
    let body = invoice_callback(invoice, status, Some(transaction), amount);
    let outcome = world.gateway().webhooks.ingest(PaymentMethod::CryptoInvoice, None, &body).await;
    world.last_callback = Some(outcome);
}

#[when(expr = "an operator verifies the order with transaction {word}")]
async fn operator_verifies(world: &mut SubscriptionWorld, transaction: String) {
    let order_id = world.order().order_id.clone();
    let result = world.gateway().activation().activate(&order_id, &transaction).await;
    world.last_error = result.err().map(|e| e.to_string());
}

#[then(expr = "the last callback was {word}")]
async fn last_callback(world: &mut SubscriptionWorld, label: String) {
    let outcome = world.last_callback.as_ref().expect("No callback has been received");
    assert_eq!(outcome.label(), label, "{outcome:?}");
}

#[then(expr = "user {int} has a {word} subscription")]
async fn has_subscription(world: &mut SubscriptionWorld, user: i64, tier: Tier) {
    let subscription = world.gateway().activation().fetch_subscription(UserId(user)).await.expect("Error fetching");
    let subscription = subscription.expect("The user has no subscription");
    assert_eq!(subscription.tier, tier);
    assert!(subscription.is_active(Utc::now()));
}

#[then(expr = "user {int} has no subscription")]
async fn has_no_subscription(world: &mut SubscriptionWorld, user: i64) {
    let subscription = world.gateway().activation().fetch_subscription(UserId(user)).await.expect("Error fetching");
    assert!(subscription.is_none());
}

#[when(expr = "I note the subscription expiry of user {int}")]
async fn note_expiry(world: &mut SubscriptionWorld, user: i64) {
    let subscription = world.gateway().activation().fetch_subscription(UserId(user)).await.expect("Error fetching");
    let expiry = subscription.expect("The user has no subscription").subscription_expiry;
    world.noted_expiries.insert(UserId(user), expiry);
}

#[then(expr = "the subscription expiry of user {int} is unchanged")]
async fn expiry_unchanged(world: &mut SubscriptionWorld, user: i64) {
    let subscription = world.gateway().activation().fetch_subscription(UserId(user)).await.expect("Error fetching");
    let expiry = subscription.expect("The user has no subscription").subscription_expiry;
    assert_eq!(Some(&expiry), world.noted_expiries.get(&UserId(user)));
}

#[then(expr = "the order's transaction reference is {word}")]
async fn transaction_reference(world: &mut SubscriptionWorld, transaction: String) {
    let order_id = world.order().order_id.clone();
    let order = world.gateway().orders.fetch_order(&order_id).await.expect("Error fetching order");
    assert_eq!(order.expect("The order no longer exists").transaction_ref, Some(transaction));
}

#[then(expr = "{int} mapping miss(es) is/are recorded today")]
async fn mapping_misses(world: &mut SubscriptionWorld, expected: i64) {
    let gw = world.gateway();
    let today = Utc::now().date_naive();
    let misses = counters::mapping_misses(&gw.store, &gw.keys, today).await.expect("Error reading counter");
    assert_eq!(misses, expected);
}
