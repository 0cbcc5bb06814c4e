//! Upstream call and response capture.

pub mod client_builder;
pub mod drain;
pub mod forward;

pub use client_builder::build_http_client;
pub use drain::drain_event_stream;
pub use forward::forward;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use tokenmeter_types::TokenUsage;

/// Everything captured from one upstream exchange.
#[derive(Debug, Clone)]
pub struct ProxyResult {
    pub status: StatusCode,
    /// Upstream `content-type`, kept for pass-through replies.
    pub content_type: Option<HeaderValue>,
    /// Exact bytes returned to the caller.
    pub body: Bytes,
    pub streaming: bool,
    pub model: String,
    /// Zero unless the upstream answered 2xx with a usage block.
    pub usage: TokenUsage,
    /// A usage block was present, even if it held zeros.
    pub usage_observed: bool,
}

impl ProxyResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Only successful replies with non-zero usage are billed.
    pub fn should_report(&self) -> bool {
        self.is_success() && self.usage.is_billable()
    }
}

impl IntoResponse for ProxyResult {
    fn into_response(self) -> Response {
        let mut response = Response::builder().status(self.status);

        if self.streaming && self.status.is_success() {
            response = response
                .header(header::CONTENT_TYPE, "text/event-stream")
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::CONNECTION, "keep-alive");
        } else {
            let content_type = self
                .content_type
                .unwrap_or_else(|| HeaderValue::from_static("application/json"));
            response = response.header(header::CONTENT_TYPE, content_type);
        }

        match response.body(Body::from(self.body)) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to build proxy response: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            },
        }
    }
}
