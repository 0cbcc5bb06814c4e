use clap::{Args, Parser, Subcommand};
use tokenmeter_types::{ConfigError, GatewayConfig};

#[derive(Parser, Debug)]
#[command(
    name = "tokenmeter",
    about = "tokenmeter - metering gateway for AI provider APIs",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log filter, `EnvFilter` syntax
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(flatten)]
    pub gateway: GatewayArgs,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Start the gateway (default if no command specified)")]
    Serve,

    #[command(about = "Validate the configuration and print it as JSON")]
    CheckConfig,
}

/// Overrides on top of the built-in defaults. Unset values keep the default.
#[derive(Args, Debug, Clone, Default)]
pub struct GatewayArgs {
    #[arg(long, env = "HOST", global = true)]
    pub host: Option<String>,

    #[arg(short, long, env = "PORT", global = true)]
    pub port: Option<u16>,

    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "ANTHROPIC_BASE_URL", global = true)]
    pub anthropic_base_url: Option<String>,

    #[arg(long, env = "GEMINI_BASE_URL", global = true)]
    pub gemini_base_url: Option<String>,

    #[arg(long, env = "INGESTION_SERVICE_URL", global = true)]
    pub ingestion_service_url: Option<String>,

    /// Upstream deadline in milliseconds, body drain included
    #[arg(long = "upstream-timeout", env = "UPSTREAM_TIMEOUT", global = true)]
    pub upstream_timeout_ms: Option<u64>,

    /// Usage report deadline in milliseconds
    #[arg(long = "internal-timeout", env = "INTERNAL_TIMEOUT", global = true)]
    pub internal_timeout_ms: Option<u64>,

    #[arg(long, env = "USAGE_QUEUE_CAPACITY", global = true)]
    pub usage_queue_capacity: Option<usize>,

    #[arg(long, env = "USAGE_CONCURRENCY", global = true)]
    pub usage_concurrency: Option<usize>,

    #[arg(long, env = "BODY_LIMIT_BYTES", global = true)]
    pub body_limit_bytes: Option<usize>,
}

impl GatewayArgs {
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let defaults = GatewayConfig::default();
        GatewayConfig {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            openai_base_url: self.openai_base_url.unwrap_or(defaults.openai_base_url),
            anthropic_base_url: self.anthropic_base_url.unwrap_or(defaults.anthropic_base_url),
            gemini_base_url: self.gemini_base_url.unwrap_or(defaults.gemini_base_url),
            ingestion_service_url: self
                .ingestion_service_url
                .unwrap_or(defaults.ingestion_service_url),
            upstream_timeout_ms: self.upstream_timeout_ms.unwrap_or(defaults.upstream_timeout_ms),
            internal_timeout_ms: self.internal_timeout_ms.unwrap_or(defaults.internal_timeout_ms),
            usage_queue_capacity: self
                .usage_queue_capacity
                .unwrap_or(defaults.usage_queue_capacity),
            usage_concurrency: self.usage_concurrency.unwrap_or(defaults.usage_concurrency),
            body_limit_bytes: self.body_limit_bytes.unwrap_or(defaults.body_limit_bytes),
        }
        .validated()
    }
}
