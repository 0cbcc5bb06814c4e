//! Upstream wire protocols.
//!
//! Every provider plugs into the same pipeline through [`ProviderAdapter`];
//! only credential lookup, request shape and usage location differ.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use gemini::{GeminiAction, GeminiAdapter, GeminiTarget};
pub use openai::OpenAiAdapter;

use axum::http::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokenmeter_types::{Provider, TokenUsage};

/// A caller request ready to be forwarded.
#[derive(Debug, Clone)]
pub struct UpstreamCall {
    /// Model named by the caller (body field or Gemini path segment).
    pub model: String,
    pub streaming: bool,
    /// Caller JSON body, already adjusted by [`ProviderAdapter::prepare_body`].
    pub body: Value,
    /// Provider credential supplied by the caller.
    pub credential: String,
    /// Caller headers, for provider-specific pass-through (e.g. `anthropic-version`).
    pub client_headers: HeaderMap,
}

/// Usage counters seen so far in one response.
///
/// Later observations overwrite earlier ones, so the final known value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageAccumulator {
    pub model: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl UsageAccumulator {
    pub fn set_model(&mut self, model: Option<&str>) {
        if let Some(model) = model {
            self.model = Some(model.to_string());
        }
    }

    pub fn set_input(&mut self, tokens: Option<u64>) {
        if tokens.is_some() {
            self.input_tokens = tokens;
        }
    }

    pub fn set_output(&mut self, tokens: Option<u64>) {
        if tokens.is_some() {
            self.output_tokens = tokens;
        }
    }

    /// Whether any usage counter appeared in the response at all.
    pub fn observed(&self) -> bool {
        self.input_tokens.is_some() || self.output_tokens.is_some()
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.input_tokens.unwrap_or(0), self.output_tokens.unwrap_or(0))
    }
}

/// One upstream wire protocol.
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// The caller's provider credential, if present.
    fn extract_credential(&self, headers: &HeaderMap, query: Option<&str>) -> Option<String>;

    /// Message returned with the 401 when the credential is missing.
    fn missing_credential_message(&self) -> &'static str;

    /// Adjust the caller body before forwarding.
    fn prepare_body(&self, _body: &mut Value, _streaming: bool) {}

    fn build_upstream_request(
        &self,
        client: &Client,
        base_url: &str,
        call: &UpstreamCall,
    ) -> RequestBuilder;

    /// Usage from a complete (non-streaming) JSON reply.
    fn parse_buffered_usage(&self, body: &Value, acc: &mut UsageAccumulator);

    /// Usage from one decoded `data:` payload of a streamed reply.
    fn observe_stream_event(&self, event: &Value, acc: &mut UsageAccumulator);

    /// Model to bill when the reply never named one.
    fn fallback_model(&self, call: &UpstreamCall) -> String {
        call.model.clone()
    }
}

/// Header value as UTF-8, ignoring empty strings.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok()).map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_keeps_last_value() {
        let mut acc = UsageAccumulator::default();
        assert!(!acc.observed());

        acc.set_input(Some(3));
        acc.set_input(None);
        acc.set_output(Some(1));
        acc.set_output(Some(8));
        acc.set_model(Some("m1"));
        acc.set_model(None);

        assert!(acc.observed());
        assert_eq!(acc.usage(), TokenUsage::new(3, 8));
        assert_eq!(acc.model.as_deref(), Some("m1"));
    }

    #[test]
    fn test_observed_explicit_zero() {
        let mut acc = UsageAccumulator::default();
        acc.set_input(Some(0));
        assert!(acc.observed());
        assert!(!acc.usage().is_billable());
    }
}
