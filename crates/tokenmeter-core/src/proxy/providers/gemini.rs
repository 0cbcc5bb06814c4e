//! Google Gemini `generateContent` / `streamGenerateContent`.

use std::fmt;
use std::str::FromStr;

use axum::http::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokenmeter_types::{Provider, ProxyError};

use super::{header_str, ProviderAdapter, UpstreamCall, UsageAccumulator};
use crate::proxy::common::read_u64;

pub const MODELS_PATH: &str = "/v1beta/models";

const API_KEY_HEADER: &str = "x-goog-api-key";
const API_KEY_QUERY: &str = "key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiAction {
    GenerateContent,
    StreamGenerateContent,
}

impl GeminiAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateContent => "generateContent",
            Self::StreamGenerateContent => "streamGenerateContent",
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::StreamGenerateContent)
    }
}

impl FromStr for GeminiAction {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generateContent" => Ok(Self::GenerateContent),
            "streamGenerateContent" => Ok(Self::StreamGenerateContent),
            other => Err(ProxyError::InvalidRequest {
                message: format!(
                    "Unknown action: {}. Expected: generateContent or streamGenerateContent",
                    other
                ),
            }),
        }
    }
}

impl fmt::Display for GeminiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model and action named by the `{model}:{action}` path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiTarget {
    pub model: String,
    pub action: GeminiAction,
}

impl GeminiTarget {
    /// Split the wildcard segment at its last colon.
    pub fn parse(model_action: &str) -> Result<Self, ProxyError> {
        let invalid_path = || ProxyError::InvalidRequest {
            message: "Invalid request path. Expected: /v1beta/models/<model>:<action>".to_string(),
        };

        let segment = model_action.trim_start_matches('/');
        let (model, action) = segment.rsplit_once(':').ok_or_else(invalid_path)?;
        if model.is_empty() {
            return Err(invalid_path());
        }
        if !is_plain_model_name(model) {
            return Err(ProxyError::InvalidRequest {
                message: format!("Invalid model name: {}", model),
            });
        }

        Ok(Self { model: model.to_string(), action: action.parse()? })
    }

    pub fn is_streaming(&self) -> bool {
        self.action.is_streaming()
    }
}

/// The model must stay a single path segment once it is decoded.
fn is_plain_model_name(model: &str) -> bool {
    model != "."
        && model != ".."
        && !model.chars().any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_control())
}

/// `{base}/v1beta/models/{model}:{action}`, with the model pushed as one
/// encoded segment.
fn upstream_url(base_url: &str, model: &str, action: GeminiAction) -> String {
    let target = format!("{}:{}", model, action);
    match url::Url::parse(base_url) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(["v1beta", "models"]).push(&target);
            }
            url.to_string()
        },
        _ => format!("{}{}/{}", base_url, MODELS_PATH, target),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiAdapter;

impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn extract_credential(&self, headers: &HeaderMap, query: Option<&str>) -> Option<String> {
        if let Some(key) = header_str(headers, API_KEY_HEADER) {
            return Some(key.to_string());
        }
        let query = query?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == API_KEY_QUERY)
            .map(|(_, value)| value.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    fn missing_credential_message(&self) -> &'static str {
        "Missing API key. Expected: x-goog-api-key header or key query parameter"
    }

    fn build_upstream_request(
        &self,
        client: &Client,
        base_url: &str,
        call: &UpstreamCall,
    ) -> RequestBuilder {
        let action = if call.streaming {
            GeminiAction::StreamGenerateContent
        } else {
            GeminiAction::GenerateContent
        };
        let mut url = upstream_url(base_url, &call.model, action);
        if call.streaming {
            url.push_str("?alt=sse");
        }

        client.post(url).header(API_KEY_HEADER, &call.credential).json(&call.body)
    }

    fn parse_buffered_usage(&self, body: &Value, acc: &mut UsageAccumulator) {
        // The billed model is always the one named in the path.
        if let Some(meta) = body.get("usageMetadata") {
            acc.set_input(read_u64(meta, "promptTokenCount"));
            acc.set_output(read_u64(meta, "candidatesTokenCount"));
        }
    }

    fn observe_stream_event(&self, event: &Value, acc: &mut UsageAccumulator) {
        self.parse_buffered_usage(event, acc);
    }
}
