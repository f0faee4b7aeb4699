//! Key-value primitives over the `kv_entries` table.
//!
//! `now` is always supplied by the caller as unix milliseconds, so a single operation sees one consistent clock.
use sqlx::{Error as SqlxError, SqliteConnection};

use crate::traits::StoredValue;

fn to_version(version: i64) -> u64 {
    u64::try_from(version).unwrap_or_default()
}

pub async fn fetch(key: &str, now: i64, conn: &mut SqliteConnection) -> Result<Option<StoredValue>, SqlxError> {
    let row = sqlx::query_as::<_, (String, i64)>(
        "SELECT value, version FROM kv_entries WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)",
    )
    .bind(key)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(value, version)| StoredValue { value, version: to_version(version) }))
}

/// Writes `value` under `key`, replacing anything already there. If `keep_ttl` is set, a live row keeps its current
/// expiry, otherwise `expires_at` is applied.
pub async fn upsert(
    key: &str,
    value: &str,
    expires_at: Option<i64>,
    keep_ttl: bool,
    now: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SqlxError> {
    sqlx::query(
        r#"
        INSERT INTO kv_entries (key, value, version, expires_at) VALUES ($1, $2, 1, $3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            version = kv_entries.version + 1,
            expires_at = CASE WHEN $4 AND kv_entries.expires_at > $5 THEN kv_entries.expires_at
                              ELSE excluded.expires_at END
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .bind(keep_ttl)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Inserts `value` if there is no live row under `key`. An expired row is overwritten. Returns true if the write
/// happened.
pub async fn insert_if_absent(
    key: &str,
    value: &str,
    expires_at: Option<i64>,
    now: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqlxError> {
    let result = sqlx::query(
        r#"
        INSERT INTO kv_entries (key, value, version, expires_at) VALUES ($1, $2, 1, $3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            version = kv_entries.version + 1,
            expires_at = excluded.expires_at
        WHERE kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= $4
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(expires_at)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

#[allow(clippy::too_many_arguments)]
pub async fn compare_and_set(
    key: &str,
    expected_version: u64,
    value: &str,
    expires_at: Option<i64>,
    keep_ttl: bool,
    now: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqlxError> {
    let Ok(expected_version) = i64::try_from(expected_version) else {
        return Ok(false);
    };
    let result = sqlx::query(
        r#"
        UPDATE kv_entries SET
            value = $1,
            version = version + 1,
            expires_at = CASE WHEN $2 THEN expires_at ELSE $3 END
        WHERE key = $4 AND version = $5 AND (expires_at IS NULL OR expires_at > $6)
        "#,
    )
    .bind(value)
    .bind(keep_ttl)
    .bind(expires_at)
    .bind(key)
    .bind(expected_version)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Removes the row under `key`, live or not. Returns true if the removed row was live.
pub async fn delete(key: &str, now: i64, conn: &mut SqliteConnection) -> Result<bool, SqlxError> {
    let live = sqlx::query_scalar::<_, i64>(
        "DELETE FROM kv_entries WHERE key = $1 RETURNING (expires_at IS NULL OR expires_at > $2)",
    )
    .bind(key)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(live.map(|v| v != 0).unwrap_or(false))
}

/// Adds one to the counter under `key`, creating it at 1 with `expires_at` if it is missing or expired. Returns the
/// stored value after the increment.
pub async fn increment(
    key: &str,
    expires_at: Option<i64>,
    now: i64,
    conn: &mut SqliteConnection,
) -> Result<String, SqlxError> {
    sqlx::query_scalar::<_, String>(
        r#"
        INSERT INTO kv_entries (key, value, version, expires_at) VALUES ($1, '1', 1, $2)
        ON CONFLICT(key) DO UPDATE SET
            value = CASE WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= $3 THEN '1'
                         ELSE CAST(CAST(kv_entries.value AS INTEGER) + 1 AS TEXT) END,
            version = kv_entries.version + 1,
            expires_at = CASE WHEN kv_entries.expires_at IS NOT NULL AND kv_entries.expires_at <= $3
                              THEN excluded.expires_at ELSE kv_entries.expires_at END
        RETURNING value
        "#,
    )
    .bind(key)
    .bind(expires_at)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn scan_prefix(
    prefix: &str,
    now: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<(String, StoredValue)>, SqlxError> {
    let rows = sqlx::query_as::<_, (String, String, i64)>(
        r#"
        SELECT key, value, version FROM kv_entries
        WHERE substr(key, 1, length($1)) = $1 AND (expires_at IS NULL OR expires_at > $2)
        ORDER BY key
        "#,
    )
    .bind(prefix)
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(key, value, version)| (key, StoredValue { value, version: to_version(version) })).collect())
}

pub async fn purge_expired(now: i64, conn: &mut SqliteConnection) -> Result<u64, SqlxError> {
    let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= $1")
        .bind(now)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
