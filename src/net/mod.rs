//! Network layer subsystem.
//!
//! The plain listener is a `tokio::net::TcpListener` driven by `axum::serve`;
//! HTTPS goes through `axum-server` with rustls. Connections served over TLS
//! are treated as secure when cookies are relayed.

pub mod tls;
