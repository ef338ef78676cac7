//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     modules/ directory (or a static list)
//!     → discovery.rs (reverse lexical order, derive route, overrides)
//!     → router.rs (drop duplicate routes, freeze as ModuleRegistry)
//!
//! Incoming Request (path)
//!     → router.rs (first binding in registration order)
//!     → matcher.rs (segment-aware prefix match)
//!     → Return: RouteBinding or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same directory always yields the same bindings

pub mod discovery;
pub mod matcher;
pub mod router;

pub use discovery::{discover, DiscoveryError, DiscoveryOptions, HandlerFactory, RouteBinding};
pub use router::ModuleRegistry;
