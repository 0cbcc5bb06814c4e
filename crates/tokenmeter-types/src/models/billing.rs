//! Billing identity attached to every metered request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Customer/user/feature identity plus the pass-through ingestion key.
///
/// Built fresh from request headers, never persisted.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct BillingContext {
    pub customer_id: String,
    pub user_id: String,
    pub feature_id: String,
    /// Forwarded to the ingestion endpoint as `X-API-Key`.
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl BillingContext {
    /// Parse the optional metadata header. Anything other than a JSON object is dropped.
    pub fn parse_metadata(raw: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Debug for BillingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BillingContext")
            .field("customer_id", &self.customer_id)
            .field("user_id", &self.user_id)
            .field("feature_id", &self.feature_id)
            .field("api_key", &"<redacted>")
            .field("metadata", &self.metadata)
            .finish()
    }
}
