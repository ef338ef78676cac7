//! Module-routing HTTP gateway library.
//!
//! Maps every module file in a directory to a URL prefix, merges cookies,
//! query, body and uploads into one parameter bag, runs the module against
//! the upstream API and relays its status, body and cookies.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod module;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::ModuleRegistry;
