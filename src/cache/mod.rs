//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! request → CacheKey (method + path + query)
//!     → hit (fresh entry)  → stored status/headers/body, dispatcher skipped
//!     → miss               → dispatcher → status 200? → store for TTL
//! ```
//!
//! # Design Decisions
//! - Only exact `200 OK` responses are stored
//! - Entries expire after a fixed TTL; there is no explicit invalidation
//! - Concurrent misses are not coalesced; the last writer wins

pub mod middleware;
pub mod store;

pub use middleware::{cache_middleware, CacheLayerState};
pub use store::{CacheKey, CachedResponse, ResponseCache};
