use std::time::Duration;

use tokenmeter_types::GatewayConfig;

/// Pooled client shared by every upstream call.
///
/// No request timeout is set here: the whole exchange, body drain included,
/// runs under the upstream deadline in [`super::forward`].
pub fn build_http_client(config: &GatewayConfig) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(config.upstream_timeout().min(Duration::from_secs(30)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))
}

/// Client for ingestion posts, bounded by the internal timeout.
pub fn build_internal_client(config: &GatewayConfig) -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .timeout(config.internal_timeout())
        .tcp_nodelay(true)
        .build()
        .map_err(|e| format!("Failed to build ingestion client: {}", e))
}
