//! Helpers for exercising the engine in tests.
mod flaky_store;
pub mod prepare_env;

pub use flaky_store::FlakyStore;
