use crate::{
    db_types::{UserId, UserSubscription},
    keys::KeySchema,
    records::{decode, encode},
    traits::{Expiry, KeyValueStore, StoreError},
};

pub async fn fetch_subscription<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    user_id: UserId,
) -> Result<Option<UserSubscription>, StoreError> {
    let key = keys.user(user_id);
    store.get(&key).await?.map(|stored| decode::<UserSubscription>(&key, &stored)).transpose()
}

/// Subscriptions never expire from the store. Their `subscriptionExpiry` field is what grants or denies access.
pub async fn save_subscription<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    subscription: &UserSubscription,
) -> Result<(), StoreError> {
    let key = keys.user(subscription.user_id);
    let value = encode(&key, subscription)?;
    store.set(&key, &value, Expiry::Never).await
}
