//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway handler
//! - Wire up middleware (tracing, request ID, timeout, body limit, CORS, cache)
//! - Bind server to a plain or TLS listener
//! - Resolve the module for each request and dispatch to it
//! - Periodically purge expired cache entries

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, Request},
    middleware::{from_fn, from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::{cache_middleware, CacheLayerState, ResponseCache};
use crate::config::GatewayConfig;
use crate::dispatch::{dispatch, DispatchContext};
use crate::http::params::assemble;
use crate::http::request::{decoded_target, ConnectionPolicy, InboundRequest, UuidRequestId};
use crate::http::response;
use crate::module::OutboundCall;
use crate::observability::metrics;
use crate::routing::ModuleRegistry;
use crate::security::cors_middleware;

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModuleRegistry>,
    pub upstream: Arc<dyn OutboundCall>,
    pub connection: ConnectionPolicy,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    cache: ResponseCache,
}

impl HttpServer {
    /// Create a new HTTP server serving `registry`, calling out through `upstream`.
    pub fn new(
        config: GatewayConfig,
        registry: ModuleRegistry,
        upstream: Arc<dyn OutboundCall>,
    ) -> Self {
        let cache = ResponseCache::from_config(&config.cache);

        let state = AppState {
            registry: Arc::new(registry),
            upstream,
            connection: ConnectionPolicy {
                tls: config.listener.tls.is_some(),
                trust_proxy: config.listener.trust_proxy,
                max_body_size: config.security.max_body_size,
            },
        };

        let router = Self::build_router(&config, state, cache.clone());
        Self {
            router,
            config,
            cache,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, cache: ResponseCache) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state);

        if config.cache.enabled {
            let bypass_header = config
                .cache
                .bypass_header
                .as_deref()
                .and_then(|name| HeaderName::from_bytes(name.as_bytes()).ok());
            router = router.layer(from_fn_with_state(
                CacheLayerState {
                    cache,
                    bypass_header,
                },
                cache_middleware,
            ));
        }

        router
            .layer(from_fn(cors_middleware))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(map_response(response::envelope_layer_errors))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The fully layered router (useful for in-process testing).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The response cache shared with the router.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_cache_purge(shutdown.resubscribe());

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_cache_purge(shutdown.resubscribe());

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    fn spawn_cache_purge(&self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.cache.enabled {
            return;
        }
        let cache = self.cache.clone();
        let period = cache.ttl().max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.purge_expired();
                        if removed > 0 {
                            tracing::debug!(
                                removed,
                                remaining = cache.len(),
                                "Purged expired responses"
                            );
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
        });
    }
}

/// Main gateway handler.
/// Looks up the module, assembles parameters and dispatches.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let target = decoded_target(&request);

    let Some(binding) = state.registry.match_path(&path) else {
        tracing::warn!(method = %method, path = %path, "No module matched");
        metrics::record_request(&method, 404, "none", start_time);
        return response::not_found();
    };

    let inbound = match InboundRequest::read(request, &state.connection).await {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(route = %binding.route, error = %e, "Rejected request body");
            let response = e.into_response();
            let status = response.status().as_u16();
            metrics::record_request(&method, status, &binding.route, start_time);
            return response;
        }
    };

    let params = assemble(inbound.cookies, inbound.query, inbound.body, inbound.files);
    let ctx = DispatchContext {
        client_ip: inbound.client_ip,
        secure: inbound.secure,
        target,
    };
    let response = dispatch(binding, params, &ctx, state.upstream.clone()).await;

    metrics::record_request(&method, response.status().as_u16(), &binding.route, start_time);
    response
}
