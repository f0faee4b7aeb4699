use log::*;

use crate::{
    db_types::{Order, OrderId},
    keys::KeySchema,
    records::{decode, encode},
    traits::{Expiry, KeyValueStore, StoreError},
};

/// An order together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedOrder {
    pub order: Order,
    pub version: u64,
}

pub async fn fetch_order<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    order_id: &OrderId,
) -> Result<Option<VersionedOrder>, StoreError> {
    let key = keys.order(order_id);
    match store.get(&key).await? {
        Some(stored) => {
            let order = decode::<Order>(&key, &stored)?;
            Ok(Some(VersionedOrder { order, version: stored.version }))
        },
        None => Ok(None),
    }
}

/// Writes a brand new order. Returns false if an order with the same id is already live.
pub async fn insert_order<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    order: &Order,
    expiry: Expiry,
) -> Result<bool, StoreError> {
    let key = keys.order(&order.order_id);
    let value = encode(&key, order)?;
    store.set_if_absent(&key, &value, expiry).await
}

/// Replaces `current` with `next` only if nobody else has written the order since `current` was read.
pub async fn compare_and_swap_order<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    current: &VersionedOrder,
    next: &Order,
    expiry: Expiry,
) -> Result<bool, StoreError> {
    let key = keys.order(&next.order_id);
    let value = encode(&key, next)?;
    store.compare_and_set(&key, current.version, &value, expiry).await
}

pub async fn delete_order<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    order_id: &OrderId,
) -> Result<bool, StoreError> {
    store.delete(&keys.order(order_id)).await
}

/// Every live order in the store. Records that fail to decode are skipped with a warning so that one bad record
/// cannot blind the monitor.
pub async fn scan_orders<S: KeyValueStore>(store: &S, keys: &KeySchema) -> Result<Vec<Order>, StoreError> {
    let entries = store.scan_prefix(&keys.order_prefix()).await?;
    let orders = entries
        .into_iter()
        .filter_map(|(key, stored)| match decode::<Order>(&key, &stored) {
            Ok(order) => Some(order),
            Err(e) => {
                warn!("🗃️ Skipping unreadable order record. {e}");
                None
            },
        })
        .collect();
    Ok(orders)
}
