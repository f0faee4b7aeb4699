use std::time::Duration;

use log::*;
use spg_engine::{notifiers::ConfiguredNotifier, HealthMonitor, SqliteStore};
use tokio::task::JoinHandle;

/// Starts the in-process health monitor. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick runs one monitor sweep and then removes expired rows from the store. The worker runs on the actix
/// runtime of the thread that starts it.
pub fn start_monitor_worker(
    store: SqliteStore,
    monitor: HealthMonitor<SqliteStore, ConfiguredNotifier>,
    interval: Duration,
) -> JoinHandle<()> {
    actix_web::rt::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🩺️ Health monitor worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🩺️ Running scheduled health check");
            match monitor.run_once().await {
                Ok(report) => debug!(
                    "🩺️ {} stale orders, {} unextended subscriptions, {} alerts sent",
                    report.stale_orders.len(),
                    report.unextended_subscriptions.len(),
                    report.alerts_sent.len()
                ),
                Err(e) => error!("🩺️ Scheduled health check failed. {e}"),
            }
            match store.purge_expired().await {
                Ok(0) => {},
                Ok(n) => debug!("🗃️ Purged {n} expired entries"),
                Err(e) => warn!("🗃️ Could not purge expired entries. {e}"),
            }
        }
    })
}
