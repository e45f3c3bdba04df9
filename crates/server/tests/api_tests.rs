//! Router-level tests that need no upstream.

use axum_test::TestServer;
use idm_console_gateway::{
    api::{AppState, app},
    config::{AppConfig, FaviconConfig, UpstreamConfig},
    token::{CachedToken, TokenCache},
};
use std::sync::Arc;

fn test_config() -> AppConfig {
    AppConfig {
        bind_address: "127.0.0.1:0".into(),
        upstream: UpstreamConfig {
            base_url: "https://idm.example.com/".into(),
            token: Some("t".into()),
            token_file: None,
            token_refresh_secs: 300,
            timeout_secs: 10,
            max_response_bytes: 1024,
        },
        favicon: FaviconConfig::default(),
    }
}

fn server() -> TestServer {
    let tokens = Arc::new(TokenCache::with_token(CachedToken::new("t")));
    let state = AppState::from_config(&test_config(), tokens).expect("state");
    TestServer::new(app(state)).expect("create test server")
}

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let server = server();

    let response = server.get("/healthz").await;

    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_openapi_docs_are_served() {
    let server = server();

    let response = server.get("/api-docs").await;

    response.assert_status_ok();
    assert!(response.text().contains("redoc"));
}

#[tokio::test]
async fn test_proxy_rejects_get() {
    let server = server();

    let response = server.get("/api/kani").await;

    response.assert_status(axum::http::StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = server();
    let huge = "a".repeat(idm_console_gateway::api::MAX_REQUEST_BYTES + 1);

    let response = server
        .post("/api/fetch-icon")
        .text(huge)
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}
