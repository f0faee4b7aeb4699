use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, web::ServiceConfig, App, HttpServer};
use log::*;
use spg_common::Secret;
use spg_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    keys::KeySchema,
    notifiers::ConfiguredNotifier,
    pricing::PriceTable,
    providers::ProviderAdapters,
    spg_api::monitor_objects::MonitorConfig,
    traits::{AlertNotifier, KeyValueStore},
    webhooks::SignatureVerifier,
    ActivationApi,
    HealthMonitor,
    OrderFlowApi,
    SqliteStore,
    WebhookApi,
};

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::BearerAuthMiddlewareFactory,
    monitor_worker::start_monitor_worker,
    routes::{
        health,
        AdminOrderRoute,
        CheckoutWebhookRoute,
        CreateOrderRoute,
        CryptoWebhookRoute,
        ExchangeWebhookRoute,
        MobileMoneyWebhookRoute,
        OrderByIdRoute,
        PendingOrdersRoute,
        RepairOrderRoute,
        RunMonitorRoute,
        VerifyOrderRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;
const MAX_DB_CONNECTIONS: u32 = 25;

/// Everything the HTTP layer needs to build the engine APIs for one worker.
#[derive(Clone)]
pub struct GatewayComponents<S, N> {
    pub store: S,
    pub keys: KeySchema,
    pub prices: PriceTable,
    pub adapters: ProviderAdapters,
    pub verifier: SignatureVerifier,
    pub notifier: N,
    pub producers: EventProducers,
    pub order_ttl: Duration,
    pub completed_retention: Duration,
    pub monitor: MonitorConfig,
    pub options: ServerOptions,
    pub admin_tokens: Vec<Secret<String>>,
}

impl<S, N> GatewayComponents<S, N>
where
    S: KeyValueStore + 'static,
    N: AlertNotifier + Clone + 'static,
{
    /// Registers the engine APIs and every route. Webhooks and `/health` are public; `/api` and `/admin` require a
    /// bearer token.
    pub fn configure(&self, cfg: &mut ServiceConfig) {
        let orders_api = OrderFlowApi::new(self.store.clone(), self.keys.clone(), self.prices.clone(), self.adapters.clone())
            .with_order_ttl(self.order_ttl);
        let activation_api = ActivationApi::new(self.store.clone(), self.keys.clone(), self.producers.clone())
            .with_completed_retention(self.completed_retention);
        let webhook_api = WebhookApi::new(self.verifier.clone(), activation_api.clone());
        let monitor = HealthMonitor::new(self.store.clone(), self.keys.clone(), self.notifier.clone(), self.monitor.clone());
        let api_scope = web::scope("/api")
            .wrap(BearerAuthMiddlewareFactory::new(&self.admin_tokens))
            .service(CreateOrderRoute::<S>::new())
            .service(OrderByIdRoute::<S>::new());
        let admin_scope = web::scope("/admin")
            .wrap(BearerAuthMiddlewareFactory::new(&self.admin_tokens))
            .service(VerifyOrderRoute::<S>::new())
            .service(PendingOrdersRoute::<S>::new())
            .service(RepairOrderRoute::<S>::new())
            .service(AdminOrderRoute::<S>::new())
            .service(RunMonitorRoute::<S, N>::new());
        cfg.app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(activation_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(monitor))
            .app_data(web::Data::new(self.options))
            .service(health)
            .service(MobileMoneyWebhookRoute::<S>::new())
            .service(CryptoWebhookRoute::<S>::new())
            .service(CheckoutWebhookRoute::<S>::new())
            .service(ExchangeWebhookRoute::<S>::new())
            .service(api_scope)
            .service(admin_scope);
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let store = SqliteStore::new_with_url(&config.database_url, MAX_DB_CONNECTIONS, config.store_timeout)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let prices = match &config.price_table {
        Some(path) => {
            info!("🪛️ Loading price table from {path}");
            PriceTable::from_file(path).map_err(|e| ServerError::ConfigurationError(e.to_string()))?
        },
        None => PriceTable::default(),
    };
    let adapters =
        ProviderAdapters::new(config.providers.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let notifier =
        ConfiguredNotifier::new(config.telegram.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let keys = KeySchema::new(config.key_namespace.clone());
    if let Some(interval) = config.monitor_interval {
        let monitor = HealthMonitor::new(store.clone(), keys.clone(), notifier.clone(), config.monitor.clone());
        let _ = start_monitor_worker(store.clone(), monitor, interval);
    }
    let components = GatewayComponents {
        store,
        keys,
        prices,
        adapters,
        verifier: SignatureVerifier::new(config.webhook_secrets.clone()),
        notifier,
        producers,
        order_ttl: config.order_ttl,
        completed_retention: config.completed_retention,
        monitor: config.monitor.clone(),
        options: ServerOptions::from_config(&config),
        admin_tokens: config.admin_tokens.clone(),
    };
    let srv = create_server_instance(&config, components)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance<S, N>(
    config: &ServerConfig,
    components: GatewayComponents<S, N>,
) -> Result<Server, ServerError>
where
    S: KeyValueStore + Send + 'static,
    N: AlertNotifier + Clone + Send + 'static,
{
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .configure(|cfg| components.configure(cfg))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The chat layer is told about activations through these hooks. This server only logs them.
fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_subscription_activated(|ev| {
        Box::pin(async move {
            info!(
                "📬️ User {} activated {} until {} (order {})",
                ev.subscription.user_id, ev.subscription.tier, ev.subscription.subscription_expiry, ev.order.order_id
            );
        })
    });
    hooks.on_order_declined(|ev| {
        Box::pin(async move {
            info!("📬️ Order {} of user {} was declined. {}", ev.order.order_id, ev.order.user_id, ev.reason);
        })
    });
    hooks
}
