//! Gateway errors rendered in each provider's own error envelope, so an
//! unmodified provider SDK still parses them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tokenmeter_types::{Provider, ProxyError};

/// Error domain reported in Gemini `ErrorInfo` details.
const GATEWAY_ERROR_DOMAIN: &str = "tokenmeter";

pub fn error_body(provider: Provider, err: &ProxyError) -> Value {
    let message = err.client_message();
    match provider {
        Provider::OpenAi => json!({
            "error": {
                "message": message,
                "type": err.error_type(),
                "code": err.code(),
            }
        }),
        Provider::Anthropic => json!({
            "type": "error",
            "error": {
                "type": err.error_type(),
                "message": message,
                "code": err.code(),
            }
        }),
        Provider::Gemini => json!({
            "error": {
                "code": err.http_status_code(),
                "message": message,
                "status": err.rpc_status(),
                "details": [{
                    "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                    "reason": err.code(),
                    "domain": GATEWAY_ERROR_DOMAIN,
                }],
            }
        }),
    }
}

pub fn error_response(provider: Provider, err: &ProxyError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error_body(provider, err))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing_headers() -> ProxyError {
        ProxyError::MissingBillingHeaders { missing: vec!["X-OM-Api-Key".to_string()] }
    }

    #[test]
    fn test_openai_envelope() {
        let body = error_body(Provider::OpenAi, &missing_headers());
        assert_eq!(body["error"]["code"], "missing_billing_headers");
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"].as_str().unwrap().contains("X-OM-Customer-Id"));
    }

    #[test]
    fn test_anthropic_envelope() {
        let err = ProxyError::UpstreamTimeout { provider: Provider::Anthropic, duration_ms: 5 };
        let body = error_body(Provider::Anthropic, &err);
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "timeout_error");
        assert_eq!(body["error"]["message"], "Request to Anthropic timed out");
    }

    #[test]
    fn test_gemini_envelope() {
        let body = error_body(Provider::Gemini, &missing_headers());
        assert_eq!(body["error"]["code"], 400);
        assert_eq!(body["error"]["status"], "INVALID_ARGUMENT");
        assert_eq!(body["error"]["details"][0]["reason"], "missing_billing_headers");
    }

    #[test]
    fn test_response_status() {
        let err = ProxyError::UpstreamUnreachable {
            provider: Provider::OpenAi,
            message: "refused".to_string(),
        };
        assert_eq!(error_response(Provider::OpenAi, &err).status(), StatusCode::BAD_GATEWAY);
    }
}
