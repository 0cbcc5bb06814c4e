// OpenAI Handler
use axum::{extract::State, http::HeaderMap, Extension};
use bytes::Bytes;
use tokenmeter_types::BillingContext;

use super::common::{
    body_model, body_streaming, parse_json_body, proxy_request, require_credential, HandlerResult,
};
use crate::proxy::providers::{OpenAiAdapter, ProviderAdapter, UpstreamCall};
use crate::proxy::server::AppState;

/// `POST /v1/chat/completions`
pub async fn handle_chat_completions(
    State(state): State<AppState>,
    Extension(billing): Extension<BillingContext>,
    headers: HeaderMap,
    body: Bytes,
) -> HandlerResult {
    let adapter = OpenAiAdapter;
    let credential = require_credential(&adapter, &headers, None)?;
    let body = parse_json_body(adapter.provider(), &body)?;

    let call = UpstreamCall {
        model: body_model(&body),
        streaming: body_streaming(&body),
        body,
        credential,
        client_headers: headers,
    };
    proxy_request(&state, &adapter, &billing, call).await
}
