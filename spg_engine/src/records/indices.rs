//! Secondary indices that map what a provider tells us back to an order id.
use crate::{
    db_types::{OrderId, PaymentMethod},
    keys::KeySchema,
    traits::{Expiry, KeyValueStore, StoreError, StoredValue},
};

fn to_order_id(value: Option<StoredValue>) -> Option<OrderId> {
    value.map(|v| OrderId::from(v.value)).filter(|id| !id.as_str().is_empty())
}

/// Claims `reference` on `rail` for `order_id`. Returns false if the reference is already claimed by a live order.
pub async fn claim_provider_ref<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    rail: PaymentMethod,
    reference: &str,
    order_id: &OrderId,
    expiry: Expiry,
) -> Result<bool, StoreError> {
    store.set_if_absent(&keys.provider_ref(rail, reference), order_id.as_str(), expiry).await
}

/// Rewrites the index entry, e.g. to give it a new lifetime once the order has completed.
pub async fn save_provider_ref<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    rail: PaymentMethod,
    reference: &str,
    order_id: &OrderId,
    expiry: Expiry,
) -> Result<(), StoreError> {
    store.set(&keys.provider_ref(rail, reference), order_id.as_str(), expiry).await
}

pub async fn provider_ref_exists<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    rail: PaymentMethod,
    reference: &str,
) -> Result<bool, StoreError> {
    Ok(store.get(&keys.provider_ref(rail, reference)).await?.is_some())
}

pub async fn resolve_provider_ref<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    rail: PaymentMethod,
    reference: &str,
) -> Result<Option<OrderId>, StoreError> {
    Ok(to_order_id(store.get(&keys.provider_ref(rail, reference)).await?))
}

pub async fn delete_provider_ref<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    rail: PaymentMethod,
    reference: &str,
) -> Result<bool, StoreError> {
    store.delete(&keys.provider_ref(rail, reference)).await
}

/// Points the phone index at the most recent order for `phone`. Later orders overwrite earlier ones.
pub async fn save_phone<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    phone: &str,
    order_id: &OrderId,
    expiry: Expiry,
) -> Result<(), StoreError> {
    store.set(&keys.phone(phone), order_id.as_str(), expiry).await
}

pub async fn resolve_phone<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    phone: &str,
) -> Result<Option<OrderId>, StoreError> {
    Ok(to_order_id(store.get(&keys.phone(phone)).await?))
}

/// Removes the phone index if it still points at `order_id`. Best effort: a newer order that claims the number between
/// the read and the delete loses its index entry, and can still be resolved by its provider reference.
pub async fn release_phone<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    phone: &str,
    order_id: &OrderId,
) -> Result<bool, StoreError> {
    let key = keys.phone(phone);
    match store.get(&key).await? {
        Some(stored) if stored.value == order_id.as_str() => store.delete(&key).await,
        _ => Ok(false),
    }
}
