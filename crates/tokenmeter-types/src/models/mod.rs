//! Domain models for the tokenmeter gateway.

mod billing;
pub mod config;
mod provider;
mod usage;

pub use billing::BillingContext;
pub use config::GatewayConfig;
pub use provider::Provider;
pub use usage::{TokenUsage, UsageEvent, UsageEventType, USAGE_EVENT_SOURCE};
