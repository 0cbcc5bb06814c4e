//! OpenAI Chat Completions.

use axum::http::{header, HeaderMap};
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};
use tokenmeter_types::Provider;

use super::{header_str, ProviderAdapter, UpstreamCall, UsageAccumulator};
use crate::proxy::common::{read_str, read_u64};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Caller headers forwarded to OpenAI untouched.
const PASSTHROUGH_HEADERS: &[&str] = &["openai-organization", "openai-project"];

#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn extract_credential(&self, headers: &HeaderMap, _query: Option<&str>) -> Option<String> {
        header_str(headers, header::AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
    }

    fn missing_credential_message(&self) -> &'static str {
        "Missing or invalid Authorization header. Expected: Bearer <OPENAI_API_KEY>"
    }

    /// Streaming replies only carry usage when `stream_options.include_usage` is set.
    fn prepare_body(&self, body: &mut Value, streaming: bool) {
        if !streaming {
            return;
        }
        let Some(obj) = body.as_object_mut() else {
            return;
        };
        let options = obj.entry("stream_options").or_insert_with(|| json!({}));
        if let Some(options) = options.as_object_mut() {
            options.insert("include_usage".to_string(), Value::Bool(true));
        } else {
            *options = json!({ "include_usage": true });
        }
    }

    fn build_upstream_request(
        &self,
        client: &Client,
        base_url: &str,
        call: &UpstreamCall,
    ) -> RequestBuilder {
        let mut request = client
            .post(format!("{}{}", base_url, CHAT_COMPLETIONS_PATH))
            .bearer_auth(&call.credential)
            .json(&call.body);
        for name in PASSTHROUGH_HEADERS {
            if let Some(value) = header_str(&call.client_headers, name) {
                request = request.header(*name, value);
            }
        }
        request
    }

    fn parse_buffered_usage(&self, body: &Value, acc: &mut UsageAccumulator) {
        acc.set_model(read_str(body, "model"));
        if let Some(usage) = body.get("usage").filter(|u| u.is_object()) {
            acc.set_input(read_u64(usage, "prompt_tokens"));
            acc.set_output(read_u64(usage, "completion_tokens"));
        }
    }

    fn observe_stream_event(&self, event: &Value, acc: &mut UsageAccumulator) {
        // Same shape: every chunk names the model, the final chunk carries `usage`.
        self.parse_buffered_usage(event, acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer_credential() {
        let mut headers = HeaderMap::new();
        assert!(OpenAiAdapter.extract_credential(&headers, None).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(OpenAiAdapter.extract_credential(&headers, None).is_none());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer sk-test"));
        assert_eq!(OpenAiAdapter.extract_credential(&headers, None).as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_include_usage_injected_when_streaming() {
        let mut body = json!({"model": "gpt-4o", "stream": true, "messages": []});
        OpenAiAdapter.prepare_body(&mut body, true);
        assert_eq!(body["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_include_usage_overrides_false_and_keeps_other_options() {
        let mut body = json!({
            "model": "gpt-4o",
            "stream": true,
            "stream_options": {"include_usage": false, "include_obfuscation": false}
        });
        OpenAiAdapter.prepare_body(&mut body, true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["stream_options"]["include_obfuscation"], false);
    }

    #[test]
    fn test_non_streaming_body_untouched() {
        let mut body = json!({"model": "gpt-4o", "messages": []});
        let before = body.clone();
        OpenAiAdapter.prepare_body(&mut body, false);
        assert_eq!(body, before);
    }

    #[test]
    fn test_buffered_usage() {
        let body = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "usage": {"prompt_tokens": 10, "completion_tokens": 15, "total_tokens": 25}
        });
        let mut acc = UsageAccumulator::default();
        OpenAiAdapter.parse_buffered_usage(&body, &mut acc);
        assert_eq!(acc.input_tokens, Some(10));
        assert_eq!(acc.output_tokens, Some(15));
        assert_eq!(acc.model.as_deref(), Some("gpt-4o-2024-08-06"));
    }

    #[test]
    fn test_stream_chunk_with_null_usage_ignored() {
        let mut acc = UsageAccumulator::default();
        OpenAiAdapter.observe_stream_event(
            &json!({"model": "gpt-4o", "choices": [{"delta": {"content": "hi"}}], "usage": null}),
            &mut acc,
        );
        assert!(!acc.observed());
        OpenAiAdapter.observe_stream_event(
            &json!({"model": "gpt-4o", "choices": [], "usage": {"prompt_tokens": 4, "completion_tokens": 2}}),
            &mut acc,
        );
        assert_eq!(acc.input_tokens, Some(4));
        assert_eq!(acc.output_tokens, Some(2));
    }
}
