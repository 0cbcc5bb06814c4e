//! Gateway configuration.
//!
//! Built once at process start and shared read-only (`Arc<GatewayConfig>`)
//! by the router, the provider adapters and the usage reporter.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::error::ConfigError;
use crate::models::Provider;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_INGESTION_SERVICE_URL: &str = "http://localhost:8081";

/// Full gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct GatewayConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    #[validate(range(min = 1_u16))]
    pub port: u16,
    #[serde(default = "default_openai_base_url")]
    #[validate(url)]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    #[validate(url)]
    pub anthropic_base_url: String,
    #[serde(default = "default_gemini_base_url")]
    #[validate(url)]
    pub gemini_base_url: String,
    /// Base URL of the usage ingestion service
    #[serde(default = "default_ingestion_service_url")]
    #[validate(url)]
    pub ingestion_service_url: String,
    /// Deadline for one upstream call, including draining a streamed body
    #[serde(default = "default_upstream_timeout_ms")]
    #[validate(range(min = 1_u64))]
    pub upstream_timeout_ms: u64,
    /// Deadline for one usage report POST
    #[serde(default = "default_internal_timeout_ms")]
    #[validate(range(min = 1_u64))]
    pub internal_timeout_ms: u64,
    /// Pending usage reports held before new ones are dropped
    #[serde(default = "default_usage_queue_capacity")]
    #[validate(range(min = 1_usize))]
    pub usage_queue_capacity: usize,
    /// Usage report POSTs in flight at once
    #[serde(default = "default_usage_concurrency")]
    #[validate(range(min = 1_usize))]
    pub usage_concurrency: usize,
    /// Maximum accepted request body
    #[serde(default = "default_body_limit_bytes")]
    #[validate(range(min = 1_usize))]
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            gemini_base_url: default_gemini_base_url(),
            ingestion_service_url: default_ingestion_service_url(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            internal_timeout_ms: default_internal_timeout_ms(),
            usage_queue_capacity: default_usage_queue_capacity(),
            usage_concurrency: default_usage_concurrency(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Validate, trim trailing slashes off base URLs and return the final config.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        for url in [
            &mut self.openai_base_url,
            &mut self.anthropic_base_url,
            &mut self.gemini_base_url,
            &mut self.ingestion_service_url,
        ] {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }

        self.validate().map_err(|e| ConfigError::from_validation_errors(&e))?;

        for (field, value) in [
            ("openai_base_url", &self.openai_base_url),
            ("anthropic_base_url", &self.anthropic_base_url),
            ("gemini_base_url", &self.gemini_base_url),
            ("ingestion_service_url", &self.ingestion_service_url),
        ] {
            check_http_scheme(field, value)?;
        }

        Ok(self)
    }

    pub fn base_url(&self, provider: Provider) -> &str {
        match provider {
            Provider::OpenAi => &self.openai_base_url,
            Provider::Anthropic => &self.anthropic_base_url,
            Provider::Gemini => &self.gemini_base_url,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn internal_timeout(&self) -> Duration {
        Duration::from_millis(self.internal_timeout_ms)
    }

    /// Full URL of the ingestion endpoint.
    pub fn ingestion_endpoint(&self) -> String {
        format!("{}/v1/events/ingest", self.ingestion_service_url)
    }

    /// Get the full bind socket address.
    pub fn get_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn check_http_scheme(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::ValidationError {
        field: field.to_string(),
        message: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::ValidationError {
            field: field.to_string(),
            message: format!("unsupported scheme '{}', expected http or https", other),
        }),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8082
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_anthropic_base_url() -> String {
    DEFAULT_ANTHROPIC_BASE_URL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_ingestion_service_url() -> String {
    DEFAULT_INGESTION_SERVICE_URL.to_string()
}

pub const fn default_upstream_timeout_ms() -> u64 {
    120_000
}

pub const fn default_internal_timeout_ms() -> u64 {
    5_000
}

const fn default_usage_queue_capacity() -> usize {
    1024
}

const fn default_usage_concurrency() -> usize {
    16
}

const fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}
