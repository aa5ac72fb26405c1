//! Router-level tests that need no database
//!
//! The pool is created lazily and these requests never reach a query: they
//! are answered by health, the auth gates, body decoding or the rate limiter.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use buildops_core::BuildopsConfig;
use buildops_server::cache::MemoryStore;
use buildops_server::{build_router, AppState};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn app_with(config: BuildopsConfig) -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/buildops_test")
        .unwrap();
    let state = AppState::new(pool, Arc::new(MemoryStore::new()), config);
    build_router(Arc::new(state))
}

fn app() -> Router {
    app_with(BuildopsConfig::default())
}

fn rpc(procedure: &str, body: &str) -> Request<Body> {
    rpc_from(procedure, body, "198.51.100.7:40000", None)
}

/// A procedure call arriving from `peer`, as `serve` sees it through
/// `into_make_service_with_connect_info`.
fn rpc_from(procedure: &str, body: &str, peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/rpc/{procedure}"))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = forwarded_for {
        builder = builder.header("x-forwarded-for", value);
    }
    let mut request = builder.body(Body::from(body.to_owned())).unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

fn limited_config(max_requests: u64) -> BuildopsConfig {
    let mut config = BuildopsConfig::default();
    config.rate_limit.max_requests = max_requests;
    config.rate_limit.window_secs = 30;
    config
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn protected_procedure_requires_session() {
    let response = app()
        .oneshot(rpc("homeowners.list", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "You must be signed in");
}

#[tokio::test]
async fn client_procedures_are_mounted_behind_auth() {
    for procedure in ["clients.list", "clients.get", "clients.update_status"] {
        let response = app().oneshot(rpc(procedure, "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{procedure}");
    }
}

#[tokio::test]
async fn owner_procedure_requires_session_too() {
    let response = app()
        .oneshot(rpc("billing.cancel_subscription", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_is_null_when_anonymous() {
    let response = app().oneshot(rpc("auth.me", "")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, Value::Null);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let response = app()
        .oneshot(rpc("auth.login", "{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "validation_error");
}

#[tokio::test]
async fn unknown_procedure_is_not_found() {
    let response = app()
        .oneshot(rpc("homeowners.explode", "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let response = app().oneshot(rpc("auth.me", "")).await.unwrap();
    let headers = response.headers();

    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
}

#[tokio::test]
async fn procedures_are_rate_limited_per_client() {
    let app = app_with(limited_config(2));

    for remaining in ["1", "0"] {
        let response = app.clone().oneshot(rpc("auth.me", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let limited = app.clone().oneshot(rpc("auth.me", "")).await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()[header::RETRY_AFTER], "30");
    assert_eq!(json_body(limited).await["error"], "too_many_requests");

    let health = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn forwarded_header_from_untrusted_peer_is_ignored() {
    let app = app_with(limited_config(2));

    let mut statuses = Vec::new();
    for i in 0..6 {
        let forwarded = format!("10.9.9.{i}");
        let response = app
            .clone()
            .oneshot(rpc_from("auth.me", "", "203.0.113.50:51000", Some(&forwarded)))
            .await
            .unwrap();
        statuses.push(response.status().as_u16());
    }
    assert_eq!(statuses, [200, 200, 429, 429, 429, 429]);

    // A different peer has its own window
    let other = app
        .oneshot(rpc_from("auth.me", "", "203.0.113.51:51000", None))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn trusted_proxy_forwards_client_address() {
    let mut config = limited_config(1);
    config.rate_limit.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let app = app_with(config);

    // Two clients behind the same proxy are limited separately
    for client in ["198.51.100.7", "198.51.100.8"] {
        let response = app
            .clone()
            .oneshot(rpc_from("auth.me", "", "10.0.0.1:443", Some(client)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Spoofed left-most entries do not change the forwarded client
    let spoofed = app
        .oneshot(rpc_from(
            "auth.me",
            "",
            "10.0.0.1:443",
            Some("1.1.1.1, 198.51.100.7"),
        ))
        .await
        .unwrap();
    assert_eq!(spoofed.status(), StatusCode::TOO_MANY_REQUESTS);
}
