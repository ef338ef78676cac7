//! Handler outcome → HTTP response translation.
//!
//! # Responsibilities
//! - Write handler status and body
//! - Attach `Set-Cookie` headers from the handler
//! - Map failures to the error envelope rules
//!
//! # Design Decisions
//! - A failure without body becomes a fixed 404 envelope
//! - `code == 301` (string or number) means the upstream wants a login
//! - Only successful responses get `SameSite=None; Secure` on secure connections

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::module::{HandlerFailure, HandlerResult};

/// Message that replaces `msg` when the upstream answers with code 301.
pub const LOGIN_REQUIRED_MSG: &str = "需要登录";

/// Suffix appended to cookies delivered over a secure connection.
pub const CROSS_SITE_COOKIE_ATTRS: &str = "; SameSite=None; Secure";

/// The fixed `{code: 404, data: null, msg: "Not Found"}` envelope.
pub fn not_found() -> Response {
    envelope(StatusCode::NOT_FOUND, 404, "Not Found")
}

/// JSON error envelope with a `code` field mirroring the status.
pub fn envelope(status: StatusCode, code: u16, msg: &str) -> Response {
    let body = json!({ "code": code, "data": Value::Null, "msg": msg });
    write_body(status, &body, &[])
}

/// Response for a handler that completed successfully.
pub fn success(result: HandlerResult, secure: bool) -> Response {
    let cookies: Vec<String> = if secure {
        result
            .cookie
            .into_iter()
            .map(|c| format!("{}{}", c, CROSS_SITE_COOKIE_ATTRS))
            .collect()
    } else {
        result.cookie
    };
    write_body(status_code(result.status), &result.body, &cookies)
}

/// Response for a handler that failed.
pub fn failure(failure: HandlerFailure) -> Response {
    let Some(mut body) = failure.body.filter(is_truthy) else {
        return not_found();
    };

    if code_equals(&body, 301) {
        if let Value::Object(map) = &mut body {
            map.insert("msg".to_string(), Value::String(LOGIN_REQUIRED_MSG.to_string()));
        }
    }

    write_body(status_code(failure.status), &body, &failure.cookie)
}

/// Wrap timeout and body-limit rejections from the tower layers in the
/// error envelope. Responses that already carry JSON are left alone.
pub async fn envelope_layer_errors(response: Response) -> Response {
    let status = response.status();
    if !matches!(status, StatusCode::REQUEST_TIMEOUT | StatusCode::PAYLOAD_TOO_LARGE) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    envelope(status, status.as_u16(), status.canonical_reason().unwrap_or("Error"))
}

/// Loose comparison of `body.code`: `301` and `"301"` both match.
pub fn code_equals(body: &Value, code: u16) -> bool {
    match body.get("code") {
        Some(Value::Number(n)) => n.as_f64() == Some(f64::from(code)),
        Some(Value::String(s)) => *s == code.to_string(),
        _ => false,
    }
}

fn is_truthy(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn write_body(status: StatusCode, body: &Value, cookies: &[String]) -> Response {
    let (content_type, bytes) = match body {
        Value::String(text) => ("text/html; charset=utf-8", text.clone().into_bytes()),
        other => ("application/json; charset=utf-8", other.to_string().into_bytes()),
    };

    let mut response = (status, Body::from(bytes)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    for cookie in cookies {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::warn!(cookie = %cookie, "Dropping unrepresentable Set-Cookie value"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bare_layer_errors_get_envelope() {
        let bare = StatusCode::REQUEST_TIMEOUT.into_response();
        let response = envelope_layer_errors(bare).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            body_json(response).await,
            json!({ "code": 408, "data": null, "msg": "Request Timeout" })
        );

        let text = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let response = envelope_layer_errors(text).await;
        assert_eq!(body_json(response).await["code"], 413);
    }

    #[tokio::test]
    async fn test_other_responses_untouched_by_layer_envelope() {
        let existing = envelope(StatusCode::PAYLOAD_TOO_LARGE, 413, "custom");
        let response = envelope_layer_errors(existing).await;
        assert_eq!(body_json(response).await["msg"], "custom");

        let ok = (StatusCode::OK, "plain").into_response();
        let response = envelope_layer_errors(ok).await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"plain");
    }

    #[tokio::test]
    async fn test_success_writes_status_body_and_cookies() {
        let result = HandlerResult::ok(json!({ "code": 200, "data": [1] }))
            .with_cookies(["MUSIC_U=abc; Path=/", "__csrf=x; Path=/"]);
        let response = success(result, false);

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookies(&response), vec!["MUSIC_U=abc; Path=/", "__csrf=x; Path=/"]);
        assert_eq!(body_json(response).await["data"], json!([1]));
    }

    #[test]
    fn test_success_on_secure_connection_marks_cookies() {
        let result = HandlerResult::ok(json!({})).with_cookies(["a=1"]);
        let response = success(result, true);
        assert_eq!(set_cookies(&response), vec!["a=1; SameSite=None; Secure"]);
    }

    #[tokio::test]
    async fn test_failure_without_body_is_not_found() {
        let response = failure(HandlerFailure::new(502, None).with_cookies(["a=1"]));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(
            body_json(response).await,
            json!({ "code": 404, "data": null, "msg": "Not Found" })
        );

        let response = failure(HandlerFailure::new(500, Some(Value::Null)));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failure_with_login_code_rewrites_message() {
        for code in [json!(301), json!("301")] {
            let body = json!({ "code": code.clone(), "msg": "upstream says no" });
            let response = failure(HandlerFailure::new(301, Some(body)).with_cookies(["a=1"]));
            assert_eq!(response.status().as_u16(), 301);
            assert_eq!(set_cookies(&response), vec!["a=1"]);

            let body = body_json(response).await;
            assert_eq!(body["msg"], LOGIN_REQUIRED_MSG);
            assert_eq!(body["code"], code);
        }
    }

    #[tokio::test]
    async fn test_failure_passes_through_verbatim() {
        let body = json!({ "code": 400, "msg": "bad" });
        let response = failure(HandlerFailure::new(400, Some(body.clone())).with_cookies(["a=1"]));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // No cross-site attributes on the failure path.
        assert_eq!(set_cookies(&response), vec!["a=1"]);
        assert_eq!(body_json(response).await, body);
    }

    #[test]
    fn test_code_equals_is_loose() {
        assert!(code_equals(&json!({ "code": 301 }), 301));
        assert!(code_equals(&json!({ "code": "301" }), 301));
        assert!(code_equals(&json!({ "code": 301.0 }), 301));
        assert!(!code_equals(&json!({ "code": "3010" }), 301));
        assert!(!code_equals(&json!({ "msg": "301" }), 301));
    }
}
