//! HTTP client for the upstream API.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, Method};
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::UpstreamConfig;
use crate::http::cookie;
use crate::module::{CallOptions, HandlerFailure, HandlerOutcome, HandlerResult, OutboundCall};

/// Upstream codes that still count as a completed call.
const SUCCESS_ALIASES: [u16; 8] = [201, 302, 400, 502, 800, 801, 802, 803];

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream base URL: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Performs outbound calls against `upstream.base_url`.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(&config.base_url)?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http, base_url })
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        data: &Map<String, Value>,
        options: &CallOptions,
    ) -> Result<HandlerOutcome, reqwest::Error> {
        let target = match self.base_url.join(url) {
            Ok(target) => target,
            Err(e) => return Ok(Err(transport_failure(&e))),
        };

        let form = form_pairs(data);
        let mut request = self.http.request(method.clone(), target);
        request = if method == Method::GET {
            request.query(&form)
        } else {
            request.form(&form)
        };
        if !options.cookie.is_empty() {
            request = request.header(header::COOKIE, cookie::to_header(&options.cookie));
        }
        if let Some(ip) = options.ip.as_deref().filter(|ip| !ip.is_empty()) {
            request = request.header("X-Real-IP", ip).header("X-Forwarded-For", ip);
        }

        let response = request.send().await?;
        let http_status = response.status().as_u16();
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(strip_domain)
            .collect();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        let status = resolve_status(&body, http_status);
        tracing::debug!(url = %url, http_status, status, "Upstream call finished");

        Ok(if status == 200 {
            Ok(HandlerResult {
                status,
                body,
                cookie: cookies,
            })
        } else {
            Err(HandlerFailure {
                status,
                body: Some(body),
                cookie: cookies,
            })
        })
    }
}

#[async_trait]
impl OutboundCall for UpstreamClient {
    async fn call(
        &self,
        method: Method,
        url: &str,
        data: Map<String, Value>,
        options: CallOptions,
    ) -> HandlerOutcome {
        match self.send(method, url, &data, &options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Upstream transport error");
                Err(transport_failure(&e))
            }
        }
    }
}

/// Failure reported when the upstream could not be reached.
pub fn transport_failure(error: &dyn std::fmt::Display) -> HandlerFailure {
    HandlerFailure::new(502, Some(json!({ "code": 502, "msg": error.to_string() })))
}

/// Status a call resolves with, derived from `body.code` when present.
pub fn resolve_status(body: &Value, http_status: u16) -> u16 {
    let code = body_code(body).filter(|c| *c != 0);
    // Only numeric codes are aliases; `"800"` falls through to the range check.
    let numeric = matches!(body.get("code"), Some(Value::Number(_)));
    if numeric && code.is_some_and(|c| SUCCESS_ALIASES.iter().any(|a| i64::from(*a) == c)) {
        return 200;
    }
    let status = code.unwrap_or(i64::from(http_status));
    if status > 100 && status < 600 {
        status as u16
    } else {
        400
    }
}

fn body_code(body: &Value) -> Option<i64> {
    match body.get("code")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Remove the `Domain` attribute so the cookie binds to the gateway host.
pub fn strip_domain(cookie: &str) -> String {
    cookie
        .split(';')
        .filter(|attr| {
            !attr
                .trim_start()
                .get(..7)
                .is_some_and(|name| name.eq_ignore_ascii_case("domain="))
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn form_pairs(data: &Map<String, Value>) -> Vec<(String, String)> {
    data.iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}
