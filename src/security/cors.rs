//! CORS headers and preflight handling.
//!
//! # Responsibilities
//! - Answer `OPTIONS` with `204 No Content`
//! - Decorate API responses with CORS headers and a JSON content type
//!
//! # Design Decisions
//! - The root path and dotted paths (files) are left undecorated
//! - The caller's `Origin` is echoed so credentials work cross-origin

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const ALLOW_HEADERS: &str = "X-Requested-With,Content-Type";
pub const ALLOW_METHODS: &str = "PUT,POST,GET,DELETE,OPTIONS";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Whether API headers apply to `path`.
pub fn is_api_path(path: &str) -> bool {
    path != "/" && !path.contains('.')
}

pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let decorate = is_api_path(request.uri().path());
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    if decorate {
        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    }

    response
}
