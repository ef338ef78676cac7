//! Outbound call decoration.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Map, Value};

use crate::module::{CallOptions, HandlerOutcome, OutboundCall};

/// Prefix of IPv4 addresses reported by a dual-stack socket.
const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// `::ffff:127.0.0.1` → `127.0.0.1`; anything else is unchanged.
pub fn normalize_ip(ip: &str) -> &str {
    ip.strip_prefix(IPV4_MAPPED_PREFIX).unwrap_or(ip)
}

/// Wraps the upstream client and stamps every call with the caller's IP.
pub struct ClientIpCall {
    inner: Arc<dyn OutboundCall>,
    ip: String,
}

impl ClientIpCall {
    pub fn new(inner: Arc<dyn OutboundCall>, client_ip: &str) -> Self {
        Self {
            inner,
            ip: normalize_ip(client_ip).to_string(),
        }
    }
}

#[async_trait]
impl OutboundCall for ClientIpCall {
    async fn call(
        &self,
        method: Method,
        url: &str,
        data: Map<String, Value>,
        mut options: CallOptions,
    ) -> HandlerOutcome {
        // Other option fields are kept as the handler set them.
        options.ip = Some(self.ip.clone());
        self.inner.call(method, url, data, options).await
    }
}
