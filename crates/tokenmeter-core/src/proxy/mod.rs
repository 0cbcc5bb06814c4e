//! Proxy module - metering reverse proxy
//!
//! - OpenAI, Anthropic, Gemini protocol pass-through
//! - Billing identity validation on every proxied route
//! - Usage extraction from buffered JSON and SSE replies
//! - Best-effort usage reporting to the ingestion service

pub mod common;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod providers;
pub mod server;
pub mod upstream;
pub mod usage;

// Core types
pub use providers::{ProviderAdapter, UsageAccumulator};
pub use server::{build_proxy_router, AppState};
pub use upstream::{build_http_client, ProxyResult};
pub use usage::{IngestionClient, UsageReporter, UsageSink, UsageWorker};
