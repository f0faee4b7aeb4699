use log::*;

/// Loads `.env.test` if there is one and starts the logger. Safe to call from every test.
pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// A unique key namespace, so tests sharing one store cannot see each other's keys.
pub fn random_namespace() -> String {
    format!("test_{}", rand::random::<u32>())
}
