//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::discovery::{default_overrides, DiscoveryOptions, DEFAULT_MODULE_SUFFIX};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (host, port, TLS).
    pub listener: ListenerConfig,

    /// Where module files live and how they are routed.
    pub modules: ModulesConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Upstream API client settings.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind. Unset binds every interface (dual-stack).
    pub host: Option<String>,

    /// Port to bind.
    pub port: u16,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Trust `X-Forwarded-For` / `X-Forwarded-Proto` from a fronting proxy.
    pub trust_proxy: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 3000,
            tls: None,
            trust_proxy: false,
        }
    }
}

impl ListenerConfig {
    /// Address used when no host is configured.
    pub fn wildcard_address(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), self.port)
    }

    /// Resolve the configured host and port.
    pub async fn resolve(&self) -> std::io::Result<SocketAddr> {
        let Some(host) = self.host.as_deref() else {
            return Ok(self.wildcard_address());
        };
        tokio::net::lookup_host((host, self.port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("host `{}` did not resolve", host),
                )
            })
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Module discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Directory scanned for module files (non-recursive).
    pub directory: PathBuf,

    /// File suffix identifying module files.
    pub suffix: String,

    /// Exact file name → route, replacing the derived route.
    /// Unset keeps the built-in table, keyed by `suffix`.
    pub overrides: Option<BTreeMap<String, String>>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("modules"),
            suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            overrides: None,
        }
    }
}

impl ModulesConfig {
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            suffix: self.suffix.clone(),
            overrides: self
                .overrides
                .clone()
                .unwrap_or_else(|| default_overrides(&self.suffix)),
        }
    }
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the response cache.
    pub enabled: bool,

    /// Lifetime of a cached response in seconds.
    pub ttl_secs: u64,

    /// Upper bound on stored responses (unbounded when unset).
    pub max_entries: Option<usize>,

    /// Requests carrying this header are neither served from nor stored in the cache.
    pub bypass_header: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 120,
            max_entries: None,
            bypass_header: Some("x-apicache-bypass".to_string()),
        }
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL module paths are resolved against.
    pub base_url: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,

    /// User agent sent upstream.
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 20,
            user_agent: concat!("module-gateway/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB, uploads included
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
