//! Startup orchestration.
//!
//! # Responsibilities
//! - Discover modules and build the upstream client
//! - Start background tasks (metrics, signal handling)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when every module is loaded)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::module::DescriptorLoader;
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::routing::{DiscoveryError, ModuleRegistry};
use crate::upstream::{UpstreamClient, UpstreamError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
    #[error("failed to load TLS material: {0}")]
    Tls(#[source] std::io::Error),
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Load every module and assemble the server. Nothing is bound yet.
pub fn build_server(config: GatewayConfig) -> Result<HttpServer, StartupError> {
    let registry = ModuleRegistry::discover(
        &config.modules.directory,
        &config.modules.discovery_options(),
        &DescriptorLoader,
    )?;
    for binding in registry.bindings() {
        tracing::debug!(route = %binding.route, module = %binding.identifier, "Route registered");
    }

    let upstream = Arc::new(UpstreamClient::new(&config.upstream)?);
    Ok(HttpServer::new(config, registry, upstream))
}

/// Build the gateway and serve until a termination signal arrives.
pub async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = build_server(config)?;
    let listener_config = server.config().listener.clone();
    let addr = listener_config.resolve().await.map_err(StartupError::Bind)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    match &listener_config.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await.map_err(StartupError::Tls)?;
            server
                .run_tls(addr, rustls, server_shutdown)
                .await
                .map_err(StartupError::Serve)
        }
        None => {
            let listener = TcpListener::bind(addr).await.map_err(StartupError::Bind)?;
            tracing::info!(
                address = %addr,
                modules = %server.config().modules.directory.display(),
                "Listening for connections"
            );
            server.run(listener, server_shutdown).await.map_err(StartupError::Serve)
        }
    }
}
