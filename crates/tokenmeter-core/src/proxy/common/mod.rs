//! Common utilities module
//!
//! Shared helpers for proxy handlers and provider adapters.

pub mod error_envelope;
pub mod sse_parser;

pub use error_envelope::{error_body, error_response};
pub use sse_parser::{data_payload, SseLineBuffer};

use serde_json::Value;

/// Read a non-negative integer field from a JSON object.
pub(crate) fn read_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}

/// Read a non-empty string field from a JSON object.
pub(crate) fn read_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
