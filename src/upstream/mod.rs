//! Upstream API access.
//!
//! # Data Flow
//! ```text
//! handler → ClientIpCall (adds ip) → UpstreamClient
//!     → POST/GET base_url + module url (form data, Cookie, X-Real-IP)
//!     → body.code decides the outcome
//!     → Ok(HandlerResult) when it resolves to 200, Err(HandlerFailure) otherwise
//! ```
//!
//! # Design Decisions
//! - Transport errors become a 502 failure, never a panic or raw error
//! - `Domain` is stripped from upstream cookies so they bind to the gateway
//! - No retries; the caller decides what to do with a failure

pub mod client;

pub use client::{UpstreamClient, UpstreamError};
