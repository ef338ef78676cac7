//! Module handler contract.
//!
//! # Data Flow
//! ```text
//! ParameterBag + OutboundCall
//!     → Capability::handle (one per upstream endpoint)
//!     → outbound.call(method, url, data, options)
//!     → Ok(HandlerResult) | Err(HandlerFailure)
//! ```
//!
//! # Design Decisions
//! - Handlers are opaque: the gateway only sees their outcome
//! - The outbound call is injected so the dispatcher can decorate it
//! - Success and failure share one shape; a failure may lack a body

pub mod descriptor;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Map, Value};

use crate::http::cookie::CookieMap;
use crate::http::params::ParameterBag;

pub use descriptor::{DescriptorLoader, DescriptorModule, ModuleDescriptor};

/// A completed upstream call.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResult {
    /// HTTP status to answer with.
    pub status: u16,
    /// Response payload.
    pub body: Value,
    /// `Set-Cookie` values to hand to the client, in order.
    pub cookie: Vec<String>,
}

impl HandlerResult {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            cookie: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cookie = cookies.into_iter().map(Into::into).collect();
        self
    }
}

/// A failed upstream call. A missing body is answered with a plain 404.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerFailure {
    pub status: u16,
    pub body: Option<Value>,
    pub cookie: Vec<String>,
}

impl HandlerFailure {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            cookie: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cookie = cookies.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of a handler or an outbound call.
pub type HandlerOutcome = Result<HandlerResult, HandlerFailure>;

/// Options passed as the fourth argument of an outbound call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Client address the upstream should see.
    pub ip: Option<String>,
    /// Cookies to send upstream.
    pub cookie: CookieMap,
    /// Any other handler-specific options (e.g. `crypto`).
    pub extra: Map<String, Value>,
}

/// The function a handler uses to reach the upstream API.
#[async_trait]
pub trait OutboundCall: Send + Sync {
    async fn call(
        &self,
        method: Method,
        url: &str,
        data: Map<String, Value>,
        options: CallOptions,
    ) -> HandlerOutcome;
}

/// One upstream capability, bound to a route by the registry.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn handle(
        &self,
        params: ParameterBag,
        outbound: Arc<dyn OutboundCall>,
    ) -> HandlerOutcome;
}

/// Capability backed by an async closure.
pub struct FnCapability<F> {
    f: F,
}

/// Wrap an async closure as a [`Capability`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Capability>
where
    F: Fn(ParameterBag, Arc<dyn OutboundCall>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    Arc::new(FnCapability { f })
}

#[async_trait]
impl<F, Fut> Capability for FnCapability<F>
where
    F: Fn(ParameterBag, Arc<dyn OutboundCall>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerOutcome> + Send + 'static,
{
    async fn handle(
        &self,
        params: ParameterBag,
        outbound: Arc<dyn OutboundCall>,
    ) -> HandlerOutcome {
        (self.f)(params, outbound).await
    }
}
