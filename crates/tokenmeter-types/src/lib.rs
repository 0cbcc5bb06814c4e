//! # tokenmeter Types
//!
//! Core types, models, and error definitions for the tokenmeter gateway.
//!
//! - **`error`** - Typed error hierarchy for proxying and configuration
//! - **`models`** - Billing identity, usage events, providers and gateway config
//!
//! ## Architecture Role
//!
//! `tokenmeter-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!         tokenmeter-types (this crate)
//!                 │
//!                 ▼
//!          tokenmeter-core
//!                 │
//!                 ▼
//!         tokenmeter-server
//! ```

pub mod error;
pub mod models;

// Re-export error types for convenience
pub use error::{ConfigError, ProxyError};

// Re-export core model types
pub use models::{BillingContext, GatewayConfig, Provider, TokenUsage, UsageEvent};
