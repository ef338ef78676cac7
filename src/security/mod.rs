//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → cors.rs (preflight short-circuit)
//!     → [body limit enforced by the HTTP layer]
//!     → gateway handler
//!     → cors.rs (response headers)
//! ```
//!
//! # Design Decisions
//! - Authentication is left to the upstream; the gateway only relays cookies
//! - Any origin may call the API; CORS headers never reject a request

pub mod cors;

pub use cors::cors_middleware;
