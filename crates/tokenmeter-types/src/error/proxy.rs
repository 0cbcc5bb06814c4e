//! Proxy-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Provider;

/// Errors that terminate a proxied request with a gateway-generated reply.
///
/// An upstream that answers with a non-2xx status is not an error here: its
/// status and body are passed through to the caller untouched.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ProxyError {
    /// One or more required `X-OM-*` billing headers are absent
    #[error("Missing required billing headers: {}", missing.join(", "))]
    MissingBillingHeaders { missing: Vec<String> },

    /// Caller did not supply the provider's own credential
    #[error("Missing {provider} credential: {message}")]
    MissingCredential { provider: Provider, message: String },

    /// Request body or path could not be understood
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Upstream did not finish within the configured deadline
    #[error("Request to {provider} timed out after {duration_ms}ms")]
    UpstreamTimeout { provider: Provider, duration_ms: u64 },

    /// Upstream could not be reached (connect/transport failure)
    #[error("Failed to connect to {provider}: {message}")]
    UpstreamUnreachable { provider: Provider, message: String },

    /// Internal proxy error (bugs, unexpected states)
    #[error("Internal proxy error: {message}")]
    Internal { message: String },
}

impl ProxyError {
    /// Get HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingBillingHeaders { .. } | Self::InvalidRequest { .. } => 400,
            Self::MissingCredential { .. } => 401,
            Self::UpstreamUnreachable { .. } => 502,
            Self::UpstreamTimeout { .. } => 504,
            Self::Internal { .. } => 500,
        }
    }

    /// Machine-readable gateway error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingBillingHeaders { .. } => "missing_billing_headers",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::MissingCredential { .. } => "missing_api_key",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::UpstreamUnreachable { .. } => "upstream_unreachable",
            Self::Internal { .. } => "proxy_error",
        }
    }

    /// Error `type` used by OpenAI and Anthropic envelopes.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MissingBillingHeaders { .. } | Self::InvalidRequest { .. } => {
                "invalid_request_error"
            },
            Self::MissingCredential { .. } => "authentication_error",
            Self::UpstreamTimeout { .. } => "timeout_error",
            Self::UpstreamUnreachable { .. } => "connection_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Canonical `google.rpc.Code` name used by Gemini envelopes.
    pub fn rpc_status(&self) -> &'static str {
        match self {
            Self::MissingBillingHeaders { .. } | Self::InvalidRequest { .. } => "INVALID_ARGUMENT",
            Self::MissingCredential { .. } => "UNAUTHENTICATED",
            Self::UpstreamTimeout { .. } => "DEADLINE_EXCEEDED",
            Self::UpstreamUnreachable { .. } => "UNAVAILABLE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Message shown to the caller. Transport details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::MissingBillingHeaders { .. } => "Missing required billing headers. Required: \
                 X-OM-Customer-Id, X-OM-User-Id, X-OM-Feature-Id, X-OM-Api-Key"
                .to_string(),
            Self::MissingCredential { message, .. } | Self::InvalidRequest { message } => {
                message.clone()
            },
            Self::UpstreamTimeout { provider, .. } => {
                format!("Request to {} timed out", provider.display_name())
            },
            Self::UpstreamUnreachable { provider, .. } => {
                format!("Failed to connect to {}", provider.display_name())
            },
            Self::Internal { .. } => "Internal proxy error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            ProxyError::MissingBillingHeaders { missing: vec!["X-OM-User-Id".to_string()] }
                .http_status_code(),
            400
        );
        assert_eq!(
            ProxyError::UpstreamTimeout { provider: Provider::OpenAi, duration_ms: 10 }
                .http_status_code(),
            504
        );
        assert_eq!(
            ProxyError::UpstreamUnreachable {
                provider: Provider::Gemini,
                message: "connection refused".to_string()
            }
            .http_status_code(),
            502
        );
    }

    #[test]
    fn test_codes_are_stable() {
        let err = ProxyError::MissingBillingHeaders { missing: vec![] };
        assert_eq!(err.code(), "missing_billing_headers");
        assert_eq!(err.rpc_status(), "INVALID_ARGUMENT");

        let err = ProxyError::MissingCredential {
            provider: Provider::Anthropic,
            message: "Missing x-api-key header".to_string(),
        };
        assert_eq!(err.code(), "missing_api_key");
        assert_eq!(err.error_type(), "authentication_error");
        assert_eq!(err.rpc_status(), "UNAUTHENTICATED");
    }

    #[test]
    fn test_client_message_hides_transport_details() {
        let err = ProxyError::UpstreamUnreachable {
            provider: Provider::Anthropic,
            message: "tcp connect error: 10.0.0.3:443".to_string(),
        };
        assert_eq!(err.client_message(), "Failed to connect to Anthropic");
    }
}
