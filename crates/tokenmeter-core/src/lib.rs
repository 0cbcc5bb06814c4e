//! # tokenmeter Core
//!
//! Provider proxy and usage-extraction pipeline for the tokenmeter gateway.
//!
//! ## Architecture
//!
//! ```text
//! tokenmeter-core/src/proxy/
//! ├── middleware/   # billing identity extraction, CORS
//! ├── handlers/     # OpenAI, Anthropic, Gemini routes + shared dispatch
//! ├── providers/    # ProviderAdapter trait and the three wire protocols
//! ├── upstream/     # upstream call, SSE drain, failure classification
//! ├── usage/        # best-effort usage reporting worker
//! ├── common/       # SSE line buffer, provider-shaped error envelopes
//! └── server.rs     # AppState + router
//! ```

#![allow(
    clippy::module_name_repetitions,
    reason = "Provider-prefixed type names read better at call sites"
)]
// Test-only lints: allow panic!, expect, etc. in test code
#![cfg_attr(
    test,
    allow(clippy::panic, clippy::expect_used, clippy::unwrap_used, clippy::print_stdout)
)]

pub mod proxy;

pub use proxy::{build_proxy_router, AppState};
