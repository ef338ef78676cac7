//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use module_gateway::config::GatewayConfig;
use module_gateway::module::{CallOptions, Capability, HandlerOutcome, HandlerResult, OutboundCall};
use module_gateway::routing::ModuleRegistry;
use module_gateway::HttpServer;

/// Peer address attached to requests sent through [`send`].
pub const PEER: &str = "[::ffff:10.1.2.3]:52000";

/// Outbound call that answers with what it was asked to send.
pub struct EchoUpstream;

#[async_trait]
impl OutboundCall for EchoUpstream {
    async fn call(
        &self,
        method: Method,
        url: &str,
        data: Map<String, Value>,
        options: CallOptions,
    ) -> HandlerOutcome {
        Ok(HandlerResult::ok(json!({
            "code": 200,
            "method": method.as_str(),
            "url": url,
            "data": data,
            "ip": options.ip,
            "cookie": options.cookie,
        })))
    }
}

/// Router serving `modules` (file name, handler) against [`EchoUpstream`].
pub fn gateway<I>(modules: I, config: GatewayConfig) -> Router
where
    I: IntoIterator<Item = (&'static str, Arc<dyn Capability>)>,
{
    let registry = ModuleRegistry::from_static(modules, &config.modules.discovery_options());
    HttpServer::new(config, registry, Arc::new(EchoUpstream)).router()
}

/// Attach a peer address the way `into_make_service_with_connect_info` does.
pub fn with_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

/// A decoded gateway reply.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|v| v.to_str().unwrap())
    }
}

/// Send one request through the router from [`PEER`].
pub async fn send(router: &Router, request: Request<Body>) -> Reply {
    let response = router.clone().oneshot(with_peer(request, PEER)).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Reply {
        status,
        headers,
        body,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// A request seen by [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

/// What [`MockUpstream`] answers with.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub cookies: Vec<String>,
}

impl MockReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            cookies: Vec::new(),
        }
    }

    pub fn with_cookie(mut self, cookie: &str) -> Self {
        self.cookies.push(cookie.to_string());
        self
    }
}

type Responder = Arc<dyn Fn(&Captured) -> MockReply + Send + Sync>;

#[derive(Clone)]
struct MockState {
    seen: Arc<Mutex<Vec<Captured>>>,
    respond: Responder,
}

/// Programmable upstream API bound on a local port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<Captured>>>,
}

impl MockUpstream {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&Captured) -> MockReply + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            seen: seen.clone(),
            respond: Arc::new(respond),
        };
        let app = Router::new().fallback(mock_handler).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, seen }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Captured> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> Captured {
        self.requests().pop().expect("upstream was not called")
    }
}

async fn mock_handler(State(state): State<MockState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let captured = Captured {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    };

    let reply = (state.respond)(&captured);
    state.seen.lock().unwrap().push(captured);

    let mut response = (
        StatusCode::from_u16(reply.status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response();
    for cookie in reply.cookies {
        response
            .headers_mut()
            .append(header::SET_COOKIE, cookie.parse().unwrap());
    }
    response
}

/// Write a module descriptor into `dir`.
pub fn write_module(dir: &std::path::Path, file: &str, content: &str) {
    std::fs::write(dir.join(file), content).unwrap();
}
