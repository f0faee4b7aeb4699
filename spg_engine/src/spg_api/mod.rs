//! The public face of the payment engine.
//!
//! * [`order_flow_api::OrderFlowApi`] prices and opens new orders.
//! * [`webhook_api::WebhookApi`] authenticates provider callbacks and resolves them to orders.
//! * [`activation_api::ActivationApi`] performs every order state transition and owns the subscription records. Both
//!   webhooks and the admin override go through it.
//! * [`monitor_api::HealthMonitor`] is the periodic reconciliation sweep.
pub mod activation_api;
pub mod errors;
pub mod monitor_api;
pub mod monitor_objects;
pub mod order_flow_api;
pub mod order_objects;
pub mod webhook_api;
pub mod webhook_objects;
