// Middleware module - Axum middleware

pub mod billing;
pub mod cors;

pub use billing::{extract_billing_context, require_billing_context};
pub use cors::cors_layer;
