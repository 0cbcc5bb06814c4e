// Gemini Handler
use axum::{
    extract::{Path, RawQuery, State},
    http::HeaderMap,
    Extension,
};
use bytes::Bytes;
use tokenmeter_types::BillingContext;

use super::common::{
    parse_json_body, proxy_request, require_credential, HandlerResult, ProviderErrorResponse,
};
use crate::proxy::providers::{GeminiAdapter, GeminiTarget, ProviderAdapter, UpstreamCall};
use crate::proxy::server::AppState;

/// `POST /v1beta/models/{model}:{action}`
///
/// Model and streaming mode come from the path, not the body.
pub async fn handle_generate_content(
    State(state): State<AppState>,
    Extension(billing): Extension<BillingContext>,
    Path(model_action): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let adapter = GeminiAdapter;
    let credential = require_credential(&adapter, &headers, query.as_deref())?;
    let target = GeminiTarget::parse(&model_action)
        .map_err(|e| ProviderErrorResponse::new(adapter.provider(), e))?;
    let body = parse_json_body(adapter.provider(), &body)?;

    tracing::debug!("[Gemini] {} -> {}", target.model, target.action);

    let call = UpstreamCall {
        streaming: target.is_streaming(),
        model: target.model,
        body,
        credential,
        client_headers: headers,
    };
    proxy_request(&state, &adapter, &billing, call).await
}
