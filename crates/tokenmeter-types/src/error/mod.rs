//! Typed error definitions for tokenmeter.
//!
//! All errors are serializable, displayable and matchable by variant.

mod config;
mod proxy;

pub use config::ConfigError;
pub use proxy::ProxyError;
