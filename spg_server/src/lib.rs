//! # SPG server
//! This crate hosts the HTTP boundary of the subscription payment gateway. It is responsible for:
//! * Receiving payment callbacks from each provider and handing them to the webhook ingest engine.
//! * Creating orders on behalf of the chat layer.
//! * The operator routes: manual verification, pending order listing, subscription repair and on-demand health checks.
//! * Optionally running the health monitor on a timer.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /webhook/{mobile-money|crypto|checkout|exchange}`: provider callbacks, one route per rail.
//! * `POST /api/orders`, `GET /api/orders/{order_id}`: order creation and lookup (bearer token).
//! * `POST /admin/verify`, `GET /admin/pending`, `POST /admin/repair/{order_id}`, `GET /admin/order/{order_id}`,
//!   `POST /admin/monitor/run`: operator routes (bearer token).

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod monitor_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
