//! Shared request pipeline for the three provider routes.

use std::time::Instant;

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tokenmeter_types::{BillingContext, Provider, ProxyError};

use crate::proxy::common::error_response;
use crate::proxy::providers::{ProviderAdapter, UpstreamCall};
use crate::proxy::server::AppState;
use crate::proxy::upstream::forward;

/// Model name used when the caller body does not name one.
pub const UNKNOWN_MODEL: &str = "unknown";

/// A gateway error rendered in the envelope of the route's provider.
#[derive(Debug)]
pub struct ProviderErrorResponse {
    provider: Provider,
    error: ProxyError,
}

impl ProviderErrorResponse {
    pub fn new(provider: Provider, error: ProxyError) -> Self {
        Self { provider, error }
    }

    pub fn error(&self) -> &ProxyError {
        &self.error
    }
}

impl IntoResponse for ProviderErrorResponse {
    fn into_response(self) -> Response {
        error_response(self.provider, &self.error)
    }
}

pub type HandlerResult = Result<Response, ProviderErrorResponse>;

pub(crate) fn require_credential<A: ProviderAdapter>(
    adapter: &A,
    headers: &HeaderMap,
    query: Option<&str>,
) -> Result<String, ProviderErrorResponse> {
    adapter.extract_credential(headers, query).ok_or_else(|| {
        ProviderErrorResponse::new(
            adapter.provider(),
            ProxyError::MissingCredential {
                provider: adapter.provider(),
                message: adapter.missing_credential_message().to_string(),
            },
        )
    })
}

/// The caller body must be a JSON object.
pub(crate) fn parse_json_body(provider: Provider, raw: &[u8]) -> Result<Value, ProviderErrorResponse> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(body @ Value::Object(_)) => Ok(body),
        Ok(_) => Err(ProviderErrorResponse::new(
            provider,
            ProxyError::InvalidRequest { message: "Request body must be a JSON object".to_string() },
        )),
        Err(e) => Err(ProviderErrorResponse::new(
            provider,
            ProxyError::InvalidRequest { message: format!("Invalid JSON body: {}", e) },
        )),
    }
}

pub(crate) fn body_model(body: &Value) -> String {
    body.get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(UNKNOWN_MODEL)
        .to_string()
}

pub(crate) fn body_streaming(body: &Value) -> bool {
    body.get("stream").and_then(Value::as_bool).unwrap_or(false)
}

/// Forward, reply, then queue the usage report.
///
/// The report is queued only after the full reply has been captured and
/// never delays it.
pub(crate) async fn proxy_request<A: ProviderAdapter>(
    state: &AppState,
    adapter: &A,
    billing: &BillingContext,
    mut call: UpstreamCall,
) -> HandlerResult {
    let provider = adapter.provider();
    adapter.prepare_body(&mut call.body, call.streaming);

    tracing::info!(
        customer_id = %billing.customer_id,
        user_id = %billing.user_id,
        model = %call.model,
        streaming = call.streaming,
        "[{}] Proxy request",
        provider
    );

    let started = Instant::now();
    let result = forward(adapter, &state.http_client, &state.config, &call).await.map_err(|e| {
        tracing::error!(
            customer_id = %billing.customer_id,
            model = %call.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "[{}] Upstream call failed: {}",
            provider,
            e
        );
        ProviderErrorResponse::new(provider, e)
    })?;

    tracing::info!(
        status = result.status.as_u16(),
        model = %result.model,
        input_tokens = result.usage.input_tokens,
        output_tokens = result.usage.output_tokens,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "[{}] Upstream replied",
        provider
    );
    if result.is_success() && !result.usage_observed {
        tracing::warn!(
            customer_id = %billing.customer_id,
            model = %result.model,
            "[{}] No usage found in successful reply, nothing billed",
            provider
        );
    }

    let report = result.should_report().then(|| (result.model.clone(), result.usage));
    let response = result.into_response();

    if let Some((model, usage)) = report {
        state.usage_reporter.report(billing, provider, &model, usage);
    }
    Ok(response)
}
