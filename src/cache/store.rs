//! In-memory response store.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Header added to responses served from the cache.
pub const X_CACHE: &str = "x-cache";

/// Request identity: method, path and query. The body is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, uri: &Uri) -> Self {
        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        Self(format!("{} {}", method, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A response snapshot.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        response
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared response cache. Cloning shares the same entries.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    max_entries: Option<usize>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            ttl,
            max_entries: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            max_entries: config.max_entries,
            ..Self::new(Duration::from_secs(config.ttl_secs))
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for `key`. Expired entries are dropped on the way.
    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Instant::now();
        if let Some(entry) = self.inner.get(key) {
            if entry.is_fresh(now) {
                return Some(entry.response.clone());
            }
        }
        self.inner.remove_if(key, |_, entry| !entry.is_fresh(now));
        None
    }

    /// Store `response` under `key` for one TTL. Overwrites any previous entry.
    pub fn insert(&self, key: CacheKey, response: CachedResponse) {
        if let Some(max) = self.max_entries {
            if self.inner.len() >= max && !self.inner.contains_key(&key) {
                self.purge_expired();
                if self.inner.len() >= max {
                    tracing::debug!(
                        key = %key.as_str(),
                        max_entries = max,
                        "Response cache full, not storing"
                    );
                    return;
                }
            }
        }

        let expires_at = Instant::now() + self.ttl;
        self.inner.insert(key, CacheEntry { response, expires_at });
        metrics::record_cache_size(self.inner.len());
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_fresh(now));
        let removed = before.saturating_sub(self.inner.len());
        metrics::record_cache_size(self.inner.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
