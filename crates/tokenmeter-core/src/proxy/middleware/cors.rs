// CORS middleware
use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

/// Headers browsers may send: billing identity plus each provider's credential.
const ALLOWED_HEADERS: &[&str] = &[
    "content-type",
    "authorization",
    "x-om-customer-id",
    "x-om-user-id",
    "x-om-feature-id",
    "x-om-api-key",
    "x-om-metadata",
    "x-api-key",
    "anthropic-version",
    "anthropic-beta",
    "x-goog-api-key",
];

/// create CORS layer
pub fn cors_layer() -> CorsLayer {
    let headers: Vec<HeaderName> =
        ALLOWED_HEADERS.iter().filter_map(|h| HeaderName::from_bytes(h.as_bytes()).ok()).collect();

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers)
        .allow_credentials(false)
        .max_age(std::time::Duration::from_secs(3600))
}
