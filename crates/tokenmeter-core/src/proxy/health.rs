//! Liveness and readiness probes.
//!
//! None of these touch an upstream: the gateway holds no state that could be
//! unhealthy on its own.

use axum::Json;
use serde_json::{json, Value};

pub const SERVICE_NAME: &str = "ai-proxy-service";

/// `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}

/// `GET /health/live`
pub async fn liveness() -> Json<Value> {
    Json(json!({ "status": "live" }))
}

/// `GET /health/ready`
pub async fn readiness() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
