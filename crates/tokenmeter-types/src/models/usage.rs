//! Usage events sent to the ingestion service.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{BillingContext, Provider};

/// Value of `metadata.source` on every event emitted by the gateway.
pub const USAGE_EVENT_SOURCE: &str = "ai-proxy";

/// Token counters extracted from one upstream response.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self { input_tokens, output_tokens }
    }

    /// Zero on both sides means there is nothing to bill.
    pub const fn is_billable(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageEventType {
    #[default]
    TokenUsage,
}

/// Normalized record of tokens consumed by one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageEvent {
    pub event_id: String,
    pub customer_id: String,
    pub user_id: String,
    pub event_type: UsageEventType,
    pub feature_id: String,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
    pub metadata: Map<String, Value>,
}

impl UsageEvent {
    pub fn new(context: &BillingContext, provider: Provider, model: &str, usage: TokenUsage) -> Self {
        Self::at(context, provider, model, usage, Utc::now())
    }

    pub fn at(
        context: &BillingContext,
        provider: Provider,
        model: &str,
        usage: TokenUsage,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = context.metadata.clone().unwrap_or_default();
        metadata.insert("source".to_string(), Value::from(USAGE_EVENT_SOURCE));

        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            customer_id: context.customer_id.clone(),
            user_id: context.user_id.clone(),
            event_type: UsageEventType::TokenUsage,
            feature_id: context.feature_id.clone(),
            provider: provider.billing_name().to_string(),
            model: model.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn context(metadata: Option<Map<String, Value>>) -> BillingContext {
        BillingContext {
            customer_id: "cust-1".to_string(),
            user_id: "user-1".to_string(),
            feature_id: "chat".to_string(),
            api_key: "om_key".to_string(),
            metadata,
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().expect("valid date");
        let event = UsageEvent::at(
            &context(None),
            Provider::Gemini,
            "gemini-1.5-flash",
            TokenUsage::new(7, 9),
            now,
        );
        let json = serde_json::to_value(&event).expect("serializes");

        assert_eq!(json["event_type"], "TOKEN_USAGE");
        assert_eq!(json["provider"], "GOOGLE");
        assert_eq!(json["input_tokens"], 7);
        assert_eq!(json["output_tokens"], 9);
        assert_eq!(json["timestamp"], "2025-03-01T12:00:00.000Z");
        assert_eq!(json["metadata"]["source"], "ai-proxy");
        assert!(uuid::Uuid::parse_str(&event.event_id).is_ok());
    }

    #[test]
    fn test_source_overrides_caller_metadata() {
        let mut meta = Map::new();
        meta.insert("source".to_string(), Value::from("caller"));
        meta.insert("team".to_string(), Value::from("search"));

        let event =
            UsageEvent::new(&context(Some(meta)), Provider::OpenAi, "gpt-4o", TokenUsage::new(1, 1));
        assert_eq!(event.metadata["source"], "ai-proxy");
        assert_eq!(event.metadata["team"], "search");
    }

    #[test]
    fn test_billable() {
        assert!(!TokenUsage::default().is_billable());
        assert!(TokenUsage::new(0, 3).is_billable());
        assert!(TokenUsage::new(3, 0).is_billable());
    }
}
