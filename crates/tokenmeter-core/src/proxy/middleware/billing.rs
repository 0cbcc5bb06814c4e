//! Billing identity extraction.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tokenmeter_types::{BillingContext, Provider, ProxyError};

use crate::proxy::common::error_response;

pub const CUSTOMER_ID_HEADER: &str = "x-om-customer-id";
pub const USER_ID_HEADER: &str = "x-om-user-id";
pub const FEATURE_ID_HEADER: &str = "x-om-feature-id";
pub const API_KEY_HEADER: &str = "x-om-api-key";
pub const METADATA_HEADER: &str = "x-om-metadata";

/// Canonical spelling used in error messages.
const REQUIRED_HEADERS: [(&str, &str); 4] = [
    (CUSTOMER_ID_HEADER, "X-OM-Customer-Id"),
    (USER_ID_HEADER, "X-OM-User-Id"),
    (FEATURE_ID_HEADER, "X-OM-Feature-Id"),
    (API_KEY_HEADER, "X-OM-Api-Key"),
];

/// Absent, empty and non-UTF-8 values all count as missing.
fn required(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Build the billing context, or list every missing header.
pub fn extract_billing_context(headers: &HeaderMap) -> Result<BillingContext, ProxyError> {
    let [customer_id, user_id, feature_id, api_key] =
        REQUIRED_HEADERS.map(|(name, _)| required(headers, name));

    match (customer_id, user_id, feature_id, api_key) {
        (Some(customer_id), Some(user_id), Some(feature_id), Some(api_key)) => {
            let metadata = headers
                .get(METADATA_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(BillingContext::parse_metadata);
            Ok(BillingContext { customer_id, user_id, feature_id, api_key, metadata })
        },
        _ => {
            let missing = REQUIRED_HEADERS
                .iter()
                .filter(|(name, _)| required(headers, name).is_none())
                .map(|(_, display)| (*display).to_string())
                .collect();
            Err(ProxyError::MissingBillingHeaders { missing })
        },
    }
}

/// Route layer: reject unbilled requests before any upstream work.
///
/// The state is the provider owning the route, so the 400 uses its envelope.
pub async fn require_billing_context(
    State(provider): State<Provider>,
    mut request: Request,
    next: Next,
) -> Response {
    match extract_billing_context(request.headers()) {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        },
        Err(err) => {
            tracing::warn!("{} request rejected: {}", provider, err);
            error_response(provider, &err)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn full_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-om-customer-id", HeaderValue::from_static("cust-1"));
        headers.insert("x-om-user-id", HeaderValue::from_static("user-1"));
        headers.insert("x-om-feature-id", HeaderValue::from_static("chat"));
        headers.insert("x-om-api-key", HeaderValue::from_static("om_key"));
        headers
    }

    #[test]
    fn test_complete_identity() {
        let mut headers = full_headers();
        headers.insert("x-om-metadata", HeaderValue::from_static(r#"{"team":"search"}"#));

        let context = extract_billing_context(&headers).unwrap();
        assert_eq!(context.customer_id, "cust-1");
        assert_eq!(context.api_key, "om_key");
        assert_eq!(context.metadata.unwrap()["team"], "search");
    }

    #[test]
    fn test_each_missing_header_rejected() {
        for (name, display) in REQUIRED_HEADERS {
            let mut headers = full_headers();
            headers.remove(name);
            let err = extract_billing_context(&headers).unwrap_err();
            assert_eq!(err, ProxyError::MissingBillingHeaders { missing: vec![display.to_string()] });
        }
    }

    #[test]
    fn test_empty_and_non_utf8_count_as_missing() {
        let mut headers = full_headers();
        headers.insert("x-om-user-id", HeaderValue::from_static(""));
        headers.insert("x-om-api-key", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());

        let err = extract_billing_context(&headers).unwrap_err();
        assert_eq!(
            err,
            ProxyError::MissingBillingHeaders {
                missing: vec!["X-OM-User-Id".to_string(), "X-OM-Api-Key".to_string()]
            }
        );
    }

    #[test]
    fn test_malformed_metadata_dropped() {
        for raw in ["not json", "[1,2]", "\"text\""] {
            let mut headers = full_headers();
            headers.insert("x-om-metadata", HeaderValue::from_str(raw).unwrap());
            assert!(extract_billing_context(&headers).unwrap().metadata.is_none());
        }
    }
}
