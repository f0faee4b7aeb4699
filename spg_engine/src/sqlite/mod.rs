//! SQLite backend for the subscription payment gateway.
//!
//! All state lives in one `kv_entries` table. TTLs are enforced at query time, so an expired row is invisible to every
//! operation even before [`SqliteStore::purge_expired`] reclaims it.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteStore;
