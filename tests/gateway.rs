//! End-to-end behaviour of the gateway router with in-process modules.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Map};

use common::{gateway, get, send};
use module_gateway::config::GatewayConfig;
use module_gateway::http::response::LOGIN_REQUIRED_MSG;
use module_gateway::module::{handler_fn, Capability, HandlerFailure, HandlerResult};

fn uncached() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.cache.enabled = false;
    config
}

fn with_cookie() -> Arc<dyn Capability> {
    handler_fn(|_, _| async {
        Ok(HandlerResult::ok(json!({ "code": 200, "profile": { "nickname": "n" } }))
            .with_cookies(["MUSIC_U=abc; Path=/", "__csrf=xyz; Path=/"]))
    })
}

fn echo_params() -> Arc<dyn Capability> {
    handler_fn(|params, _| async move { Ok(HandlerResult::ok(params.to_json())) })
}

fn failing(status: u16, body: Option<serde_json::Value>) -> Arc<dyn Capability> {
    handler_fn(move |_, _| {
        let failure = HandlerFailure::new(status, body.clone()).with_cookies(["trace=1"]);
        async move { Err(failure) }
    })
}

fn named(name: &'static str) -> Arc<dyn Capability> {
    handler_fn(move |_, _| async move { Ok(HandlerResult::ok(json!({ "module": name }))) })
}

#[tokio::test]
async fn test_success_relays_body_and_cookies() {
    let router = gateway([("login_status.toml", with_cookie())], uncached());

    let reply = send(&router, get("/login/status")).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["profile"]["nickname"], "n");
    assert_eq!(reply.set_cookies(), vec!["MUSIC_U=abc; Path=/", "__csrf=xyz; Path=/"]);
}

#[tokio::test]
async fn test_secure_forwarded_connection_marks_cookies_cross_site() {
    let mut config = uncached();
    config.listener.trust_proxy = true;
    let router = gateway([("login_status.toml", with_cookie())], config);

    let request = Request::builder()
        .uri("/login/status")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(
        reply.set_cookies(),
        vec![
            "MUSIC_U=abc; Path=/; SameSite=None; Secure",
            "__csrf=xyz; Path=/; SameSite=None; Secure",
        ]
    );
}

#[tokio::test]
async fn test_forwarded_proto_ignored_without_trusted_proxy() {
    let router = gateway([("login_status.toml", with_cookie())], uncached());

    let request = Request::builder()
        .uri("/login/status")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.set_cookies()[0], "MUSIC_U=abc; Path=/");
}

#[tokio::test]
async fn test_failure_without_body_is_not_found_envelope() {
    let router = gateway([("song_url.toml", failing(500, None))], uncached());

    let reply = send(&router, get("/song/url")).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, json!({ "code": 404, "data": null, "msg": "Not Found" }));
    assert!(reply.set_cookies().is_empty());
}

#[tokio::test]
async fn test_login_required_message_rewritten() {
    let router = gateway(
        [(
            "user_account.toml",
            failing(301, Some(json!({ "code": 301, "msg": "need login", "extra": true }))),
        )],
        uncached(),
    );

    let reply = send(&router, get("/user/account")).await;

    assert_eq!(reply.status.as_u16(), 301);
    assert_eq!(reply.body["msg"], LOGIN_REQUIRED_MSG);
    assert_eq!(reply.body["extra"], true);
    assert_eq!(reply.set_cookies(), vec!["trace=1"]);
}

#[tokio::test]
async fn test_login_required_matches_string_code() {
    let router = gateway(
        [("user_account.toml", failing(301, Some(json!({ "code": "301", "msg": "x" }))))],
        uncached(),
    );

    let reply = send(&router, get("/user/account")).await;
    assert_eq!(reply.body["msg"], LOGIN_REQUIRED_MSG);
}

#[tokio::test]
async fn test_other_failures_pass_through() {
    let router = gateway(
        [("song_url.toml", failing(400, Some(json!({ "code": 400, "msg": "bad id" }))))],
        uncached(),
    );

    let reply = send(&router, get("/song/url")).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, json!({ "code": 400, "msg": "bad id" }));
    assert_eq!(reply.set_cookies(), vec!["trace=1"]);
}

#[tokio::test]
async fn test_parameter_precedence() {
    let router = gateway([("echo.toml", echo_params())], uncached());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/echo?a=query&b=query&list=1&list=2")
        .header(header::COOKIE, "a=cookie; c=cookie")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"b":"body","n":5}"#))
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.body["cookie"], json!({ "a": "cookie", "c": "cookie" }));
    assert_eq!(reply.body["a"], "query");
    assert_eq!(reply.body["b"], "body");
    assert_eq!(reply.body["list"], json!(["1", "2"]));
    assert_eq!(reply.body["n"], 5);
}

#[tokio::test]
async fn test_cookie_string_in_query_is_parsed() {
    let router = gateway([("echo.toml", echo_params())], uncached());

    let reply = send(&router, get("/echo?cookie=MUSIC_U%3Dxyz%3B%20os%3Dpc")).await;

    assert_eq!(reply.body["cookie"], json!({ "MUSIC_U": "xyz", "os": "pc" }));
}

#[tokio::test]
async fn test_cookie_object_in_json_body_is_used_as_cookie_map() {
    let router = gateway([("echo.toml", echo_params())], uncached());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(header::COOKIE, "os=pc")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"cookie":{"MUSIC_U":"x"}}"#))
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.body["cookie"], json!({ "MUSIC_U": "x" }));
}

#[tokio::test]
async fn test_form_body_and_uploaded_file() {
    let router = gateway([("echo.toml", echo_params())], uncached());

    let form = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("id=7&name=song"))
        .unwrap();
    let reply = send(&router, form).await;
    assert_eq!(reply.body["id"], "7");
    assert_eq!(reply.body["name"], "song");

    let multipart = concat!(
        "--BOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"songFile\"\r\n\r\n",
        "text\r\n",
        "--BOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"songFile\"; filename=\"a.mp3\"\r\n",
        "Content-Type: audio/mpeg\r\n\r\n",
        "hello\r\n",
        "--BOUNDARY--\r\n",
    );
    let upload = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
        .body(Body::from(multipart))
        .unwrap();
    let reply = send(&router, upload).await;
    assert_eq!(
        reply.body["songFile"],
        json!({ "name": "a.mp3", "mimetype": "audio/mpeg", "size": 5 })
    );
}

#[tokio::test]
async fn test_malformed_json_body_is_rejected() {
    let router = gateway([("echo.toml", echo_params())], uncached());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["code"], 400);
}

#[tokio::test]
async fn test_oversized_body_gets_json_envelope() {
    let mut config = uncached();
    config.security.max_body_size = 16;
    let router = gateway([("echo.toml", echo_params())], config);

    let payload = format!(r#"{{"data":"{}"}}"#, "x".repeat(64));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/echo")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, payload.len())
        .body(Body::from(payload))
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(reply.body["code"], 413);
    assert!(reply.body["msg"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_slow_module_times_out_with_json_envelope() {
    let slow = handler_fn(|_, _| async {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(HandlerResult::ok(json!({ "code": 200 })))
    });
    let mut config = uncached();
    config.timeouts.request_secs = 1;
    let router = gateway([("slow.toml", slow)], config);

    let reply = send(&router, get("/slow")).await;

    assert_eq!(reply.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(reply.body, json!({ "code": 408, "data": null, "msg": "Request Timeout" }));
}

#[tokio::test]
async fn test_client_ip_is_normalized_for_outbound_calls() {
    let handler = handler_fn(|params, outbound| async move {
        let options = module_gateway::module::CallOptions {
            cookie: params.cookies().cloned().unwrap_or_default(),
            ..Default::default()
        };
        outbound.call(Method::POST, "/api/echo", Map::new(), options).await
    });
    let router = gateway([("probe.toml", handler)], uncached());

    let reply = send(&router, get("/probe")).await;
    assert_eq!(reply.body["ip"], "10.1.2.3");
}

#[tokio::test]
async fn test_trusted_proxy_supplies_client_ip() {
    let handler = handler_fn(|_, outbound| async move {
        outbound
            .call(Method::POST, "/api/echo", Map::new(), Default::default())
            .await
    });
    let mut config = uncached();
    config.listener.trust_proxy = true;
    let router = gateway([("probe.toml", handler)], config);

    let request = Request::builder()
        .uri("/probe")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;
    assert_eq!(reply.body["ip"], "203.0.113.9");
}

#[tokio::test]
async fn test_longest_route_wins_and_prefix_respects_segments() {
    let router = gateway(
        [
            ("user.toml", named("user")),
            ("user_detail.toml", named("user_detail")),
        ],
        uncached(),
    );

    assert_eq!(send(&router, get("/user/detail")).await.body["module"], "user_detail");
    assert_eq!(send(&router, get("/user/detail/extra")).await.body["module"], "user_detail");
    assert_eq!(send(&router, get("/user")).await.body["module"], "user");
    assert_eq!(send(&router, get("/USER/Detail")).await.body["module"], "user_detail");
    assert_eq!(send(&router, get("/userx")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_override_routes_are_flat() {
    let router = gateway([("personal_fm.toml", named("personal_fm"))], uncached());

    assert_eq!(send(&router, get("/personal_fm")).await.body["module"], "personal_fm");
    assert_eq!(send(&router, get("/personal/fm")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unmatched_route_gets_not_found_envelope() {
    let router = gateway([("search.toml", named("search"))], uncached());

    let reply = send(&router, get("/nothing/here")).await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, json!({ "code": 404, "data": null, "msg": "Not Found" }));
}

#[tokio::test]
async fn test_preflight_short_circuits_with_cors_headers() {
    let router = gateway([("search.toml", named("search"))], uncached());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/search")
        .header(header::ORIGIN, "https://app.example.com")
        .body(Body::empty())
        .unwrap();
    let reply = send(&router, request).await;

    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    assert_eq!(reply.header("access-control-allow-origin"), Some("https://app.example.com"));
    assert_eq!(reply.header("access-control-allow-credentials"), Some("true"));
    assert_eq!(
        reply.header("access-control-allow-methods"),
        Some("PUT,POST,GET,DELETE,OPTIONS")
    );
}

#[tokio::test]
async fn test_cors_headers_on_api_paths_only() {
    let router = gateway([("search.toml", named("search"))], uncached());

    let api = send(&router, get("/search?keywords=a")).await;
    assert_eq!(api.header("access-control-allow-origin"), Some("*"));
    assert_eq!(api.header("content-type"), Some("application/json; charset=utf-8"));

    let asset = send(&router, get("/favicon.ico")).await;
    assert!(asset.header("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let router = gateway([("search.toml", named("search"))], uncached());

    let reply = send(&router, get("/search")).await;
    let id = reply.header("x-request-id").unwrap();
    assert!(uuid_like(id));
}

fn uuid_like(value: &str) -> bool {
    value.len() == 36 && value.chars().filter(|c| *c == '-').count() == 4
}
