use std::time::Duration;

use chrono::NaiveDate;

use crate::{
    keys::KeySchema,
    traits::{Expiry, KeyValueStore, StoreError},
};

/// Mapping-miss counters are bucketed per UTC day and kept long enough to compare today with yesterday.
pub const MAPPING_MISS_RETENTION: Duration = Duration::from_secs(3 * 24 * 60 * 60);

pub async fn record_mapping_miss<S: KeyValueStore>(
    store: &S,
    keys: &KeySchema,
    date: NaiveDate,
) -> Result<i64, StoreError> {
    store.increment(&keys.mapping_misses(date), Expiry::After(MAPPING_MISS_RETENTION)).await
}

pub async fn mapping_misses<S: KeyValueStore>(store: &S, keys: &KeySchema, date: NaiveDate) -> Result<i64, StoreError> {
    let key = keys.mapping_misses(date);
    match store.get(&key).await? {
        Some(stored) => stored.value.trim().parse::<i64>().map_err(|e| StoreError::CorruptRecord {
            key,
            reason: format!("Counter value '{}' is not an integer. {e}", stored.value),
        }),
        None => Ok(0),
    }
}
