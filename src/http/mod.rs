//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (cookies, query, body, files, client IP)
//!     → params.rs (merge into one ParameterBag)
//!     → [dispatcher runs the module]
//!     → response.rs (status, body, Set-Cookie)
//!     → Send to client
//! ```

pub mod cookie;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use cookie::CookieMap;
pub use params::{ParamValue, ParameterBag};
pub use server::HttpServer;
