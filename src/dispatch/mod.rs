//! Request dispatch.
//!
//! # Data Flow
//! ```text
//! RouteBinding + ParameterBag + client IP
//!     → ClientIpCall wraps the upstream client
//!     → handler.handle(bag, call)
//!     → Ok  → response::success (cookies, SameSite on secure links)
//!     → Err → response::failure (404 envelope, login message, passthrough)
//! ```
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Every outcome becomes a response; nothing escapes to the server

pub mod outbound;

use std::sync::Arc;

use axum::response::Response;

use crate::http::params::ParameterBag;
use crate::http::response;
use crate::module::OutboundCall;
use crate::routing::discovery::RouteBinding;

pub use outbound::{normalize_ip, ClientIpCall};

/// Per-request facts the dispatcher needs besides the bag.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Peer address as reported by the connection.
    pub client_ip: String,
    /// Whether the client reached us over HTTPS.
    pub secure: bool,
    /// Decoded path and query, for logging.
    pub target: String,
}

/// Run the bound handler and translate its outcome.
pub async fn dispatch(
    binding: &RouteBinding,
    params: ParameterBag,
    ctx: &DispatchContext,
    upstream: Arc<dyn OutboundCall>,
) -> Response {
    let call: Arc<dyn OutboundCall> = Arc::new(ClientIpCall::new(upstream, &ctx.client_ip));

    match binding.handler.handle(params, call).await {
        Ok(result) => {
            tracing::info!(route = %binding.route, target = %ctx.target, "[OK]");
            response::success(result, ctx.secure)
        }
        Err(failure) => {
            tracing::error!(
                route = %binding.route,
                target = %ctx.target,
                status = failure.status,
                body = ?failure.body,
                "[ERR]"
            );
            response::failure(failure)
        }
    }
}
