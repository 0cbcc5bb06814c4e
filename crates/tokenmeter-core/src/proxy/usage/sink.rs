//! Transport for usage events.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokenmeter_types::{GatewayConfig, UsageEvent};

use crate::proxy::upstream::client_builder::build_internal_client;

/// Longest ingestion error body kept for the log line.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("ingestion rejected event with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("ingestion request timed out")]
    Timeout,

    #[error("ingestion transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ReportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

/// Destination of usage events.
#[async_trait]
pub trait UsageSink: Send + Sync + 'static {
    async fn send(&self, event: &UsageEvent, api_key: &str) -> Result<(), ReportError>;
}

/// Posts events to the ingestion service.
#[derive(Debug, Clone)]
pub struct IngestionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IngestionClient {
    /// `client` should carry the internal timeout.
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self, String> {
        Ok(Self::new(build_internal_client(config)?, config.ingestion_endpoint()))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UsageSink for IngestionClient {
    async fn send(&self, event: &UsageEvent, api_key: &str) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", api_key)
            .json(&json!({ "events": [event] }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(ReportError::Rejected { status: status.as_u16(), body })
    }
}
