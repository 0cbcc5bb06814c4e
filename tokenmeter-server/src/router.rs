use axum::Router;
use tower_http::trace::TraceLayer;

use tokenmeter_core::proxy::middleware::cors_layer;
use tokenmeter_core::{build_proxy_router, AppState};

/// Gateway routes plus the HTTP-level layers only the daemon needs.
pub fn build_router(state: AppState) -> Router {
    build_proxy_router(state).layer(TraceLayer::new_for_http()).layer(cors_layer())
}
