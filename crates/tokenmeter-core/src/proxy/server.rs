use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tokenmeter_types::{GatewayConfig, Provider};

use crate::proxy::handlers;
use crate::proxy::health;
use crate::proxy::middleware::require_billing_context;
use crate::proxy::upstream::build_http_client;
use crate::proxy::usage::{IngestionClient, UsageReporter, UsageWorker};

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub http_client: reqwest::Client,
    pub usage_reporter: UsageReporter,
}

impl AppState {
    pub fn new(
        config: Arc<GatewayConfig>,
        http_client: reqwest::Client,
        usage_reporter: UsageReporter,
    ) -> Self {
        Self { config, http_client, usage_reporter }
    }

    /// Build the upstream client and start the usage worker against the
    /// configured ingestion service.
    ///
    /// Must run inside a tokio runtime.
    pub fn from_config(config: GatewayConfig) -> Result<(Self, UsageWorker), String> {
        let http_client = build_http_client(&config)?;
        let ingestion = IngestionClient::from_config(&config)?;
        tracing::info!("Usage events go to {}", ingestion.endpoint());

        let (usage_reporter, worker) = UsageReporter::from_config(&config, Arc::new(ingestion));
        Ok((Self::new(Arc::new(config), http_client, usage_reporter), worker))
    }
}

/// Proxy and health routes, with billing identity required on every proxy route.
pub fn build_proxy_router(state: AppState) -> Router<()> {
    let body_limit = state.config.body_limit_bytes;

    Router::new()
        // OpenAI Protocol
        .route(
            "/v1/chat/completions",
            post(handlers::handle_chat_completions)
                .layer(from_fn_with_state(Provider::OpenAi, require_billing_context)),
        )
        // Anthropic Protocol
        .route(
            "/v1/messages",
            post(handlers::handle_messages)
                .layer(from_fn_with_state(Provider::Anthropic, require_billing_context)),
        )
        // Gemini Protocol
        .route(
            "/v1beta/models/*model_action",
            post(handlers::handle_generate_content)
                .layer(from_fn_with_state(Provider::Gemini, require_billing_context)),
        )
        // Probes
        .route("/health", get(health::health_check))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
