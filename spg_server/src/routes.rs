//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate function. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every store and provider call is therefore awaited, never blocked
//! on.
//!
//! Provider callbacks are acknowledged according to [`callback_status`]. The rules follow each provider's retry
//! behaviour: a 5xx asks the provider to re-deliver, anything else ends the conversation.
use actix_web::{get, http::StatusCode, web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use log::*;
use spg_engine::{
    db_types::{OrderId, PaymentMethod},
    order_objects::{NewOrderPayload, NewOrderRequest, PendingOrderSummary},
    spg_api::webhook_objects::IngestOutcome,
    traits::{AlertNotifier, KeyValueStore},
    webhooks::SignatureScheme,
    ActivationApi,
    HealthMonitor,
    OrderFlowApi,
    WebhookApi,
};

use crate::{
    config::ServerOptions,
    data_objects::{OrderView, PendingOrdersResponse, VerifyOrderParams, VerifyOrderResponse},
    errors::ServerError,
    helpers::get_remote_ip,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name);
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(mobile_money_webhook => Post "/webhook/mobile-money" impl KeyValueStore);
pub async fn mobile_money_webhook<S: KeyValueStore>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<S>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    ingest_callback(PaymentMethod::MobileMoneyTill, &req, &body, &api, &options).await
}

route!(crypto_webhook => Post "/webhook/crypto" impl KeyValueStore);
pub async fn crypto_webhook<S: KeyValueStore>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<S>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    ingest_callback(PaymentMethod::CryptoInvoice, &req, &body, &api, &options).await
}

route!(checkout_webhook => Post "/webhook/checkout" impl KeyValueStore);
pub async fn checkout_webhook<S: KeyValueStore>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<S>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    ingest_callback(PaymentMethod::CardCheckout, &req, &body, &api, &options).await
}

route!(exchange_webhook => Post "/webhook/exchange" impl KeyValueStore);
pub async fn exchange_webhook<S: KeyValueStore>(
    req: HttpRequest,
    body: web::Bytes,
    api: web::Data<WebhookApi<S>>,
    options: web::Data<ServerOptions>,
) -> HttpResponse {
    ingest_callback(PaymentMethod::ExchangeOrder, &req, &body, &api, &options).await
}

async fn ingest_callback<S: KeyValueStore>(
    rail: PaymentMethod,
    req: &HttpRequest,
    body: &[u8],
    api: &WebhookApi<S>,
    options: &ServerOptions,
) -> HttpResponse {
    let remote_ip = get_remote_ip(req, options.use_x_forwarded_for, options.use_forwarded);
    debug!("💻️ Received {rail} callback from {}", remote_ip.map(|ip| ip.to_string()).unwrap_or_else(|| "?".into()));
    let scheme = SignatureScheme::for_rail(rail);
    let signature = req.headers().get(scheme.header).and_then(|v| v.to_str().ok());
    let outcome = api.ingest(rail, signature, body).await;
    let status = callback_status(rail, &outcome);
    info!("💻️ {rail} callback: {} ({status})", outcome.label());
    HttpResponse::build(status).json(outcome.ack())
}

/// The HTTP status a provider receives for each ingest outcome.
///
/// Mobile money and exchange providers retry every non-2xx response aggressively, so a callback that matches no order
/// is acknowledged with 200 on those rails. Crypto and checkout providers get a 404.
pub fn callback_status(rail: PaymentMethod, outcome: &IngestOutcome) -> StatusCode {
    match outcome {
        IngestOutcome::Activated(_) |
        IngestOutcome::Declined { .. } |
        IngestOutcome::Underpaid { .. } |
        IngestOutcome::Ignored { .. } |
        IngestOutcome::NotActivatable { .. } => StatusCode::OK,
        IngestOutcome::MappingMiss { .. } => match rail {
            PaymentMethod::MobileMoneyTill | PaymentMethod::ExchangeOrder => StatusCode::OK,
            PaymentMethod::CryptoInvoice | PaymentMethod::CardCheckout => StatusCode::NOT_FOUND,
        },
        IngestOutcome::SignatureInvalid(_) => StatusCode::UNAUTHORIZED,
        IngestOutcome::Malformed(_) => StatusCode::BAD_REQUEST,
        IngestOutcome::SubscriptionNotExtended { .. } | IngestOutcome::InfraError(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
    }
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders" impl KeyValueStore);
/// Creates a pending order for the chat layer and returns it, payment instructions included.
pub async fn create_order<S: KeyValueStore>(
    body: web::Json<NewOrderPayload>,
    api: web::Data<OrderFlowApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    debug!("💻️ Order request for user {} ({} via {} in {})", payload.user_id, payload.tier, payload.method, payload.region);
    let request = NewOrderRequest::try_from(payload).map_err(|e| ServerError::ValidationError(e.to_string()))?;
    let order = api.create_order(request).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(order_by_id => Get "/orders/{order_id}" impl KeyValueStore);
pub async fn order_by_id<S: KeyValueStore>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(path.into_inner())?;
    let order = api.fetch_order(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(order_id.to_string()))?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

//----------------------------------------------   Admin  ----------------------------------------------------
route!(verify_order => Post "/verify" impl KeyValueStore);
/// Manual override. Runs exactly the same activation as a paid webhook, so repeating it is harmless.
pub async fn verify_order<S: KeyValueStore>(
    body: web::Json<VerifyOrderParams>,
    api: web::Data<ActivationApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let VerifyOrderParams { order_id, transaction_id } = body.into_inner();
    let transaction_id = transaction_id.trim();
    if transaction_id.is_empty() {
        return Err(ServerError::ValidationError("transactionId cannot be empty".into()));
    }
    info!("💻️ Operator verification of order {order_id} with transaction {transaction_id}");
    let result = api.activate(&order_id, transaction_id).await?;
    Ok(HttpResponse::Ok().json(VerifyOrderResponse::from(result)))
}

route!(pending_orders => Get "/pending" impl KeyValueStore);
pub async fn pending_orders<S: KeyValueStore>(api: web::Data<OrderFlowApi<S>>) -> Result<HttpResponse, ServerError> {
    let now = Utc::now();
    let orders = api.fetch_pending_orders().await?;
    let summaries = orders.iter().map(|o| PendingOrderSummary::new(o, now)).collect::<Vec<_>>();
    Ok(HttpResponse::Ok().json(PendingOrdersResponse::new(summaries)))
}

route!(repair_order => Post "/repair/{order_id}" impl KeyValueStore);
pub async fn repair_order<S: KeyValueStore>(
    path: web::Path<String>,
    api: web::Data<ActivationApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(path.into_inner())?;
    info!("💻️ Operator requested a subscription repair for order {order_id}");
    let result = api.repair_subscription(&order_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(admin_order => Get "/order/{order_id}" impl KeyValueStore);
pub async fn admin_order<S: KeyValueStore>(
    path: web::Path<String>,
    api: web::Data<ActivationApi<S>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = parse_order_id(path.into_inner())?;
    let order = api.fetch_order(&order_id).await?.ok_or_else(|| ServerError::NoRecordFound(order_id.to_string()))?;
    Ok(HttpResponse::Ok().json(OrderView::from(order)))
}

route!(run_monitor => Post "/monitor/run" impl KeyValueStore, AlertNotifier);
pub async fn run_monitor<S: KeyValueStore, N: AlertNotifier>(
    monitor: web::Data<HealthMonitor<S, N>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ Health monitor run requested");
    let report = monitor.run_once().await?;
    Ok(HttpResponse::Ok().json(report))
}

fn parse_order_id(raw: String) -> Result<OrderId, ServerError> {
    raw.parse::<OrderId>().map_err(ServerError::InvalidRequestPath)
}
