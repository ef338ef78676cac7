//! Cache layer wrapped around the dispatcher.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::cache::store::{CacheKey, CachedResponse, ResponseCache};
use crate::http::response::envelope;
use crate::observability::metrics;

/// State for [`cache_middleware`].
#[derive(Debug, Clone)]
pub struct CacheLayerState {
    pub cache: ResponseCache,
    /// Requests carrying this header skip the cache entirely.
    pub bypass_header: Option<HeaderName>,
}

/// Serve fresh entries directly; store `200 OK` responses on the way out.
pub async fn cache_middleware(
    State(state): State<CacheLayerState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let bypass = state
        .bypass_header
        .as_ref()
        .is_some_and(|name| request.headers().contains_key(name));
    if bypass {
        metrics::record_cache_event("bypass");
        return next.run(request).await;
    }

    let key = CacheKey::new(request.method(), request.uri());
    if let Some(cached) = state.cache.get(&key) {
        tracing::debug!(key = %key.as_str(), "Response cache hit");
        metrics::record_cache_event("hit");
        return cached.into_response();
    }
    metrics::record_cache_event("miss");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key.as_str(), error = %e, "Failed to buffer response for cache");
            return envelope(StatusCode::BAD_GATEWAY, 502, "Upstream response interrupted");
        }
    };

    state.cache.insert(
        key,
        CachedResponse {
            status: parts.status,
            headers: parts.headers.clone(),
            body: bytes.clone(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}
