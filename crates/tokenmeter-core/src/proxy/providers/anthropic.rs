//! Anthropic Messages API.

use axum::http::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokenmeter_types::Provider;

use super::{header_str, ProviderAdapter, UpstreamCall, UsageAccumulator};
use crate::proxy::common::{read_str, read_u64};

pub const MESSAGES_PATH: &str = "/v1/messages";
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

const API_KEY_HEADER: &str = "x-api-key";
const VERSION_HEADER: &str = "anthropic-version";
const BETA_HEADER: &str = "anthropic-beta";

#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicAdapter;

impl ProviderAdapter for AnthropicAdapter {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn extract_credential(&self, headers: &HeaderMap, _query: Option<&str>) -> Option<String> {
        header_str(headers, API_KEY_HEADER).map(str::to_string)
    }

    fn missing_credential_message(&self) -> &'static str {
        "Missing x-api-key header. Expected: x-api-key: <ANTHROPIC_API_KEY>"
    }

    fn build_upstream_request(
        &self,
        client: &Client,
        base_url: &str,
        call: &UpstreamCall,
    ) -> RequestBuilder {
        let version =
            header_str(&call.client_headers, VERSION_HEADER).unwrap_or(DEFAULT_ANTHROPIC_VERSION);

        let mut request = client
            .post(format!("{}{}", base_url, MESSAGES_PATH))
            .header(API_KEY_HEADER, &call.credential)
            .header(VERSION_HEADER, version)
            .json(&call.body);
        if let Some(beta) = header_str(&call.client_headers, BETA_HEADER) {
            request = request.header(BETA_HEADER, beta);
        }
        request
    }

    fn parse_buffered_usage(&self, body: &Value, acc: &mut UsageAccumulator) {
        acc.set_model(read_str(body, "model"));
        if let Some(usage) = body.get("usage") {
            acc.set_input(read_u64(usage, "input_tokens"));
            acc.set_output(read_u64(usage, "output_tokens"));
        }
    }

    fn observe_stream_event(&self, event: &Value, acc: &mut UsageAccumulator) {
        match read_str(event, "type") {
            Some("message_start") => {
                let Some(message) = event.get("message") else {
                    return;
                };
                acc.set_model(read_str(message, "model"));
                if let Some(usage) = message.get("usage") {
                    acc.set_input(read_u64(usage, "input_tokens"));
                    // message_start carries a provisional output count; message_delta replaces it
                    acc.set_output(read_u64(usage, "output_tokens"));
                }
            },
            Some("message_delta") => {
                if let Some(usage) = event.get("usage") {
                    acc.set_output(read_u64(usage, "output_tokens"));
                }
            },
            _ => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn call_with_headers(headers: HeaderMap) -> UpstreamCall {
        UpstreamCall {
            model: "claude-3-5-sonnet-20241022".to_string(),
            streaming: false,
            body: json!({"model": "claude-3-5-sonnet-20241022", "max_tokens": 16}),
            credential: "sk-ant-test".to_string(),
            client_headers: headers,
        }
    }

    #[test]
    fn test_extract_credential() {
        let mut headers = HeaderMap::new();
        assert!(AnthropicAdapter.extract_credential(&headers, None).is_none());
        headers.insert("x-api-key", HeaderValue::from_static(""));
        assert!(AnthropicAdapter.extract_credential(&headers, None).is_none());
        headers.insert("x-api-key", HeaderValue::from_static("sk-ant-test"));
        assert_eq!(
            AnthropicAdapter.extract_credential(&headers, None).as_deref(),
            Some("sk-ant-test")
        );
    }

    #[test]
    fn test_default_version_header() {
        let client = Client::new();
        let request = AnthropicAdapter
            .build_upstream_request(&client, "http://upstream", &call_with_headers(HeaderMap::new()))
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://upstream/v1/messages");
        assert_eq!(request.headers()["anthropic-version"], DEFAULT_ANTHROPIC_VERSION);
        assert_eq!(request.headers()["x-api-key"], "sk-ant-test");
        assert!(request.headers().get("anthropic-beta").is_none());
    }

    #[test]
    fn test_caller_version_and_beta_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("anthropic-version", HeaderValue::from_static("2024-01-01"));
        headers.insert("anthropic-beta", HeaderValue::from_static("prompt-caching-2024-07-31"));

        let client = Client::new();
        let request = AnthropicAdapter
            .build_upstream_request(&client, "http://upstream", &call_with_headers(headers))
            .build()
            .unwrap();

        assert_eq!(request.headers()["anthropic-version"], "2024-01-01");
        assert_eq!(request.headers()["anthropic-beta"], "prompt-caching-2024-07-31");
    }

    #[test]
    fn test_buffered_usage() {
        let body = json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-sonnet-20241022",
            "usage": {"input_tokens": 25, "output_tokens": 7}
        });
        let mut acc = UsageAccumulator::default();
        AnthropicAdapter.parse_buffered_usage(&body, &mut acc);
        assert_eq!(acc.usage().input_tokens, 25);
        assert_eq!(acc.usage().output_tokens, 7);
    }

    #[test]
    fn test_stream_events() {
        let mut acc = UsageAccumulator::default();
        AnthropicAdapter.observe_stream_event(
            &json!({
                "type": "message_start",
                "message": {"model": "claude-3-haiku", "usage": {"input_tokens": 12, "output_tokens": 1}}
            }),
            &mut acc,
        );
        AnthropicAdapter.observe_stream_event(
            &json!({"type": "content_block_delta", "delta": {"text": "hi"}}),
            &mut acc,
        );
        AnthropicAdapter.observe_stream_event(
            &json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 30}}),
            &mut acc,
        );

        assert_eq!(acc.model.as_deref(), Some("claude-3-haiku"));
        assert_eq!(acc.input_tokens, Some(12));
        assert_eq!(acc.output_tokens, Some(30));
    }
}
