//! One upstream exchange: send, capture, extract usage.

use axum::http::header;
use reqwest::Client;
use serde_json::Value;
use tokenmeter_types::{GatewayConfig, Provider, ProxyError, TokenUsage};

use super::{drain_event_stream, ProxyResult};
use crate::proxy::providers::{ProviderAdapter, UpstreamCall, UsageAccumulator};

/// Send `call` upstream and capture the whole reply.
///
/// Sending and draining the body share one deadline. A non-2xx upstream
/// status is returned as a pass-through result, not an error.
pub async fn forward<A>(
    adapter: &A,
    client: &Client,
    config: &GatewayConfig,
    call: &UpstreamCall,
) -> Result<ProxyResult, ProxyError>
where
    A: ProviderAdapter + ?Sized,
{
    let provider = adapter.provider();
    let base_url = config.base_url(provider);

    match tokio::time::timeout(config.upstream_timeout(), exchange(adapter, client, base_url, call))
        .await
    {
        Ok(result) => {
            result.map_err(|e| classify_reqwest_error(provider, config.upstream_timeout_ms, &e))
        },
        Err(_) => Err(ProxyError::UpstreamTimeout {
            provider,
            duration_ms: config.upstream_timeout_ms,
        }),
    }
}

async fn exchange<A>(
    adapter: &A,
    client: &Client,
    base_url: &str,
    call: &UpstreamCall,
) -> Result<ProxyResult, reqwest::Error>
where
    A: ProviderAdapter + ?Sized,
{
    let response = adapter.build_upstream_request(client, base_url, call).send().await?;
    let status = response.status();
    let content_type = response.headers().get(header::CONTENT_TYPE).cloned();

    if !status.is_success() {
        let body = response.bytes().await?;
        tracing::warn!(
            "{} upstream returned {} for model {}",
            adapter.provider(),
            status,
            call.model
        );
        return Ok(ProxyResult {
            status,
            content_type,
            body,
            streaming: call.streaming,
            model: call.model.clone(),
            usage: TokenUsage::default(),
            usage_observed: false,
        });
    }

    let mut acc = UsageAccumulator::default();
    let body = if call.streaming {
        drain_event_stream(adapter, response.bytes_stream(), &mut acc).await?
    } else {
        let body = response.bytes().await?;
        match serde_json::from_slice::<Value>(&body) {
            Ok(json) => adapter.parse_buffered_usage(&json, &mut acc),
            Err(e) => tracing::debug!("Upstream 2xx body is not JSON: {}", e),
        }
        body
    };

    let model = acc.model.clone().unwrap_or_else(|| adapter.fallback_model(call));
    Ok(ProxyResult {
        status,
        content_type,
        body,
        streaming: call.streaming,
        model,
        usage: acc.usage(),
        usage_observed: acc.observed(),
    })
}

/// Map a transport failure onto the gateway's error kinds.
pub fn classify_reqwest_error(
    provider: Provider,
    timeout_ms: u64,
    err: &reqwest::Error,
) -> ProxyError {
    if err.is_timeout() {
        ProxyError::UpstreamTimeout { provider, duration_ms: timeout_ms }
    } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
        ProxyError::UpstreamUnreachable { provider, message: err.to_string() }
    } else {
        ProxyError::Internal { message: err.to_string() }
    }
}
