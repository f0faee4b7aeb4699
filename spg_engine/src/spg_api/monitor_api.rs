use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{Order, OrderStatusType, UserId, UserSubscription},
    keys::KeySchema,
    records::{counters, orders, subscriptions},
    spg_api::{
        errors::MonitorError,
        monitor_objects::{AlertCondition, MonitorConfig, MonitorReport, UnextendedSubscription},
        order_objects::PendingOrderSummary,
    },
    traits::{Alert, AlertNotifier, Expiry, KeyValueStore},
};

enum Delivery {
    Sent,
    Throttled,
    Failed,
}

/// `HealthMonitor` is the reconciliation sweep. It only reads order and user state; the only keys it writes are the
/// alert throttle sentinels.
///
/// Each run reports stale pending orders, today's and yesterday's mapping misses, and completed orders whose
/// subscription was never written. Conditions that cross their thresholds raise at most one alert per condition per
/// throttle window, even when several monitors run at once.
pub struct HealthMonitor<S, N> {
    store: S,
    keys: KeySchema,
    notifier: N,
    config: MonitorConfig,
}

impl<S, N> HealthMonitor<S, N> {
    pub fn new(store: S, keys: KeySchema, notifier: N, config: MonitorConfig) -> Self {
        Self { store, keys, notifier, config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

impl<S, N> HealthMonitor<S, N>
where
    S: KeyValueStore,
    N: AlertNotifier,
{
    pub async fn run_once(&self) -> Result<MonitorReport, MonitorError> {
        let now = Utc::now();
        let all_orders = orders::scan_orders(&self.store, &self.keys).await?;
        let mut stale_orders = all_orders
            .iter()
            .filter(|o| o.is_stale(now, self.config.stale_after))
            .map(|o| PendingOrderSummary::new(o, now))
            .collect::<Vec<_>>();
        stale_orders.sort_by_key(|o| o.created_at);
        let today = now.date_naive();
        let yesterday = today.pred_opt().unwrap_or(today);
        let misses_today = counters::mapping_misses(&self.store, &self.keys, today).await?;
        let misses_yesterday = counters::mapping_misses(&self.store, &self.keys, yesterday).await?;
        let unextended_subscriptions = self.unextended_subscriptions(&all_orders, now).await?;
        debug!(
            "🩺️ {} orders scanned. {} stale, {misses_today} mapping misses today ({misses_yesterday} yesterday), {} \
             unextended subscriptions",
            all_orders.len(),
            stale_orders.len(),
            unextended_subscriptions.len()
        );

        let mut report = MonitorReport {
            run_at: now,
            stale_orders,
            misses_today,
            misses_yesterday,
            unextended_subscriptions,
            alerts_sent: vec![],
            alerts_throttled: vec![],
            alerts_failed: vec![],
        };
        for alert in self.alerts_for(&report) {
            let condition = alert.condition;
            match self.raise(alert).await {
                Delivery::Sent => report.alerts_sent.push(condition),
                Delivery::Throttled => report.alerts_throttled.push(condition),
                Delivery::Failed => report.alerts_failed.push(condition),
            }
        }
        if report.is_healthy() {
            info!("🩺️ Health check passed");
        } else {
            warn!("🩺️ Health check found problems. Alerts sent: {:?}", report.alerts_sent);
        }
        Ok(report)
    }

    fn alerts_for(&self, report: &MonitorReport) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let stale = report.stale_orders.len();
        if stale > 0 && stale >= self.config.stale_alert_threshold {
            let oldest = report.stale_orders.iter().map(|o| o.age_minutes).max().unwrap_or_default();
            let ids = report.stale_orders.iter().map(|o| o.order_id.as_str()).collect::<Vec<_>>().join(", ");
            alerts.push(Alert::new(
                AlertCondition::StalePendingOrders,
                format!("{stale} pending order(s) unconfirmed for too long. Oldest is {oldest} minutes old. {ids}"),
            ));
        }
        if report.misses_today >= self.config.mapping_miss_threshold && report.misses_today > report.misses_yesterday {
            alerts.push(Alert::new(
                AlertCondition::MappingMissSpike,
                format!(
                    "{} payment callbacks matched no order today, up from {} yesterday",
                    report.misses_today, report.misses_yesterday
                ),
            ));
        }
        if !report.unextended_subscriptions.is_empty() {
            let ids = report.unextended_subscriptions.iter().map(|u| u.order_id.as_str()).collect::<Vec<_>>().join(", ");
            alerts.push(Alert::new(
                AlertCondition::SubscriptionNotExtended,
                format!("Completed orders whose subscription was not extended. Run a repair for: {ids}"),
            ));
        }
        alerts
    }

    /// Only the caller that plants the throttle sentinel notifies. The sentinel is removed again if delivery fails so
    /// the next run can retry.
    async fn raise(&self, alert: Alert) -> Delivery {
        let key = self.keys.alert_sent(alert.condition);
        let stamp = alert.raised_at.to_rfc3339();
        match self.store.set_if_absent(&key, &stamp, Expiry::After(self.config.alert_throttle)).await {
            Ok(true) => {},
            Ok(false) => {
                debug!("🩺️ {} alert is throttled", alert.condition);
                return Delivery::Throttled;
            },
            Err(e) => {
                error!("🩺️ Could not check the {} alert throttle. {e}", alert.condition);
                return Delivery::Failed;
            },
        }
        match self.notifier.notify(&alert).await {
            Ok(()) => {
                info!("🩺️ {} alert sent", alert.condition);
                Delivery::Sent
            },
            Err(e) => {
                error!("🩺️ Could not send {} alert. {e}", alert.condition);
                if let Err(e) = self.store.delete(&key).await {
                    warn!("🩺️ Could not release the {} alert throttle. {e}", alert.condition);
                }
                Delivery::Failed
            },
        }
    }

    /// Orders that completed within the last minute are skipped, since their subscription write may still be in flight.
    async fn unextended_subscriptions(
        &self,
        orders: &[Order],
        now: DateTime<Utc>,
    ) -> Result<Vec<UnextendedSubscription>, MonitorError> {
        let settled = |o: &&Order| o.completed_at.map(|at| now - at >= chrono::Duration::minutes(1)).unwrap_or(false);
        let mut users: HashMap<UserId, Option<UserSubscription>> = HashMap::new();
        let mut result = Vec::new();
        for order in orders.iter().filter(|o| o.status == OrderStatusType::Completed).filter(settled) {
            let subscription = match users.get(&order.user_id) {
                Some(s) => s.clone(),
                None => {
                    let s = subscriptions::fetch_subscription(&self.store, &self.keys, order.user_id).await?;
                    users.insert(order.user_id, s.clone());
                    s
                },
            };
            if subscription.as_ref().map(|s| s.reflects(order)).unwrap_or(false) {
                continue;
            }
            let current_expiry: Option<DateTime<Utc>> = subscription.map(|s| s.subscription_expiry);
            result.push(UnextendedSubscription {
                order_id: order.order_id.clone(),
                user_id: order.user_id,
                tier: order.tier,
                completed_at: order.completed_at,
                expected_expiry: order.entitlement_expiry(),
                current_expiry,
            });
        }
        Ok(result)
    }
}
