//! Inbound request decoding.
//!
//! # Responsibilities
//! - Parse cookies, query string, body fields and uploaded files
//! - Determine the client address and whether the link is secure
//! - Generate request IDs for tracing
//!
//! # Design Decisions
//! - Body format is chosen by `Content-Type`; unknown types yield no fields
//! - Forwarding headers are only honoured when the proxy is trusted
//! - Body size is bounded before anything is buffered

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequest, Multipart},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::http::cookie::{self, CookieMap};
use crate::http::params::{
    fields_from_json, fields_from_pairs, push_text, Fields, ParamValue, UploadedFile,
};
use crate::http::response;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body too large or unreadable: {0}")]
    Read(String),
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),
    #[error("invalid multipart body: {0}")]
    Multipart(String),
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        let status = match self {
            BodyError::Read(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        response::envelope(status, status.as_u16(), &self.to_string())
    }
}

/// How to interpret the connection the request arrived on.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectionPolicy {
    /// Listener terminates TLS itself.
    pub tls: bool,
    /// Honour `X-Forwarded-For` / `X-Forwarded-Proto`.
    pub trust_proxy: bool,
    /// Largest body that will be buffered.
    pub max_body_size: usize,
}

/// Everything the gateway reads from an inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub cookies: CookieMap,
    pub query: Fields,
    pub body: Fields,
    pub files: Fields,
    pub client_ip: String,
    pub secure: bool,
}

impl InboundRequest {
    /// Decode `request`, consuming its body.
    pub async fn read(
        request: Request<Body>,
        policy: &ConnectionPolicy,
    ) -> Result<Self, BodyError> {
        let headers = request.headers();
        let cookies = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(cookie::parse)
            .unwrap_or_default();
        let query = parse_query(request.uri().query());
        let client_ip = client_ip(&request, policy);
        let secure = is_secure(headers, policy);

        let (body, files) = read_body(request, policy.max_body_size).await?;

        Ok(Self {
            cookies,
            query,
            body,
            files,
            client_ip,
            secure,
        })
    }
}

/// Query string → fields; repeated keys become lists.
pub fn parse_query(query: Option<&str>) -> Fields {
    match query {
        Some(q) => fields_from_pairs(form_urlencoded::parse(q.as_bytes()).into_owned()),
        None => Fields::new(),
    }
}

/// Path and query with escapes resolved, for log lines.
pub fn decoded_target(request: &Request<Body>) -> String {
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    percent_decode_str(target).decode_utf8_lossy().into_owned()
}

fn client_ip(request: &Request<Body>, policy: &ConnectionPolicy) -> String {
    if policy.trust_proxy {
        let forwarded = request
            .headers()
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn is_secure(headers: &HeaderMap, policy: &ConnectionPolicy) -> bool {
    if policy.tls {
        return true;
    }
    policy.trust_proxy
        && headers
            .get(X_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

async fn read_body(request: Request<Body>, limit: usize) -> Result<(Fields, Fields), BodyError> {
    match content_type(request.headers()).as_str() {
        "multipart/form-data" => read_multipart(request).await,
        "application/json" => {
            let bytes = axum::body::to_bytes(request.into_body(), limit)
                .await
                .map_err(|e| BodyError::Read(e.to_string()))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok((Fields::new(), Fields::new()));
            }
            let value: serde_json::Value = serde_json::from_slice(&bytes)?;
            Ok((fields_from_json(value), Fields::new()))
        }
        "application/x-www-form-urlencoded" => {
            let bytes = axum::body::to_bytes(request.into_body(), limit)
                .await
                .map_err(|e| BodyError::Read(e.to_string()))?;
            let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&bytes)?;
            Ok((fields_from_pairs(pairs), Fields::new()))
        }
        _ => Ok((Fields::new(), Fields::new())),
    }
}

async fn read_multipart(request: Request<Body>) -> Result<(Fields, Fields), BodyError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| BodyError::Multipart(e.body_text()))?;

    let mut body = Fields::new();
    let mut files = Fields::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BodyError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let mimetype = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| BodyError::Multipart(e.body_text()))?;
                files.insert(
                    name,
                    ParamValue::File(UploadedFile {
                        name: file_name,
                        mimetype,
                        data,
                    }),
                );
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| BodyError::Multipart(e.body_text()))?;
                push_text(&mut body, name, text);
            }
        }
    }

    Ok((body, files))
}
