//! Favicon discovery tests against wiremock-hosted origins.

use axum::http::StatusCode;
use axum_test::TestServer;
use idm_console_gateway::{
    api::{AppState, app},
    error::GatewayError,
    favicon::{FaviconResolver, FaviconSettings},
    proxy::{IdentityProxy, UpstreamClient, UpstreamSettings},
    security::{BlockedHostSet, CLOUD_METADATA_HOSTS, HostGuard, PathAllowlist},
    token::{CachedToken, TokenCache},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

fn gateway_with_guard(guard: HostGuard) -> TestServer {
    let upstream = UpstreamClient::new(UpstreamSettings {
        base_url: "http://127.0.0.1:9".into(),
        timeout: Duration::from_secs(1),
        max_response_bytes: 1024,
    })
    .expect("upstream client");
    let proxy = IdentityProxy::new(
        PathAllowlist::default(),
        Arc::new(TokenCache::with_token(CachedToken::new("unused"))),
        upstream,
    );
    let settings = FaviconSettings {
        timeout: Duration::from_secs(2),
        ..FaviconSettings::default()
    };
    let favicons = FaviconResolver::new(guard, settings).expect("favicon resolver");
    TestServer::new(app(AppState::new(proxy, favicons))).expect("create test server")
}

fn gateway() -> TestServer {
    gateway_with_guard(HostGuard::default())
}

fn html_with_links(links: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_raw(
        format!("<html><head><title>x</title>{links}</head><body>Not found</body></html>"),
        "text/html; charset=utf-8",
    )
}

#[tokio::test]
async fn test_png_is_returned_without_trying_svg() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.svg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<svg/>", "image/svg+xml"))
        .expect(0)
        .mount(&origin)
        .await;

    let server = gateway();
    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": format!("{}/some/page?x=1", origin.uri()) }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type").to_str().unwrap(), "image/png");
    assert_eq!(
        response.header("cache-control").to_str().unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(response.as_bytes().as_ref(), PNG);
}

#[tokio::test]
async fn test_html_link_hint_is_followed() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(html_with_links(
            r#"<link rel="stylesheet" href="/app.css"><link rel="shortcut icon" href="/static/brand.png">"#,
        ))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/static/brand.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.css"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.svg"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&origin)
        .await;

    let server = gateway();
    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": origin.uri() }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), PNG);
}

#[tokio::test]
async fn test_blocked_candidate_is_skipped() {
    let origin = MockServer::start().await;
    let port = origin.address().port();
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(html_with_links(&format!(
            r#"<link rel="icon" href="http://localhost:{port}/evil.png"><link rel="icon" href="/good.png">"#
        )))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/evil.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"evil".to_vec(), "image/png"))
        .expect(0)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/good.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&origin)
        .await;

    let server = gateway_with_guard(HostGuard::new(BlockedHostSet::new(["localhost"])));
    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": origin.uri() }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), PNG);
}

fn resolver(guard: HostGuard, max_redirects: usize) -> FaviconResolver {
    let settings = FaviconSettings {
        timeout: Duration::from_secs(2),
        max_redirects,
        ..FaviconSettings::default()
    };
    FaviconResolver::new(guard, settings).expect("favicon resolver")
}

async fn redirecting_origin(target: String) -> MockServer {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", target.as_str()))
        .mount(&origin)
        .await;
    origin
}

#[tokio::test]
async fn test_redirect_to_blocked_host_is_not_followed() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/evil.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"evil".to_vec(), "image/png"))
        .expect(0)
        .mount(&target)
        .await;
    let origin =
        redirecting_origin(format!("http://localhost:{}/evil.png", target.address().port())).await;

    let guard = HostGuard::new(BlockedHostSet::new(["localhost"]));
    let result = resolver(guard, 5).resolve(&origin.uri()).await;

    assert!(matches!(result, Err(GatewayError::NotFound)), "{result:?}");
}

#[tokio::test]
async fn test_redirect_to_allowed_host_is_followed() {
    let target = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/real.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&target)
        .await;
    let origin =
        redirecting_origin(format!("http://localhost:{}/real.png", target.address().port())).await;

    let image = resolver(HostGuard::default(), 5)
        .resolve(&origin.uri())
        .await
        .expect("redirect is followed");

    assert_eq!(image.bytes.as_ref(), PNG);
}

#[tokio::test]
async fn test_redirect_chain_longer_than_limit_is_refused() {
    let origin = MockServer::start().await;
    for (from, to) in [
        ("/favicon.png", "/hop1"),
        ("/hop1", "/hop2"),
        ("/hop2", "/hop3"),
    ] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("location", to))
            .mount(&origin)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/hop3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .expect(1)
        .mount(&origin)
        .await;

    let short = resolver(HostGuard::default(), 2).resolve(&origin.uri()).await;
    assert!(matches!(short, Err(GatewayError::NotFound)), "{short:?}");

    let long = resolver(HostGuard::default(), 3)
        .resolve(&origin.uri())
        .await
        .expect("three hops fit in the limit");
    assert_eq!(long.bytes.as_ref(), PNG);
}

#[tokio::test]
async fn test_well_known_path_seen_as_hint_is_not_refetched() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.png"))
        .respond_with(html_with_links(r#"<link rel="icon" href="/favicon.svg">"#))
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.svg"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("missing", "text/plain"))
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&origin)
        .await;

    let result = resolver(HostGuard::default(), 5).resolve(&origin.uri()).await;

    assert!(matches!(result, Err(GatewayError::NotFound)), "{result:?}");
}

#[tokio::test]
async fn test_non_image_success_is_not_an_icon() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("MZ", "application/octet-stream"))
        .mount(&origin)
        .await;

    let server = gateway();
    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": origin.uri() }))
        .await;

    response.assert_status_not_found();
    response.assert_json(&json!({ "error": "No favicon found at the common locations or in HTML" }));
}

#[tokio::test]
async fn test_metadata_origins_are_forbidden() {
    let server = gateway();
    for host in CLOUD_METADATA_HOSTS {
        let origin = if host.contains(':') {
            format!("http://[{host}]")
        } else {
            format!("http://{host}")
        };
        let response = server
            .post("/api/fetch-icon")
            .json(&json!({ "origin": origin }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
        response.assert_json(&json!({ "error": "Origin not allowed" }));
    }

    for origin in ["http://0xa9fea9fe/", "file:///etc/passwd", "gopher://example.com"] {
        let response = server
            .post("/api/fetch-icon")
            .json(&json!({ "origin": origin }))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_bad_input_is_rejected() {
    let server = gateway();

    let response = server.post("/api/fetch-icon").json(&json!({})).await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "Origin is required" }));

    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": "not a url" }))
        .await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "Invalid origin URL" }));

    let response = server
        .post("/api/fetch-icon")
        .json(&json!({ "origin": ["https://example.com"] }))
        .await;
    response.assert_status_bad_request();
    response.assert_json(&json!({ "error": "Invalid origin URL" }));
}

#[tokio::test]
async fn test_resolution_is_repeatable() {
    let origin = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/favicon.svg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<svg/>", "image/svg+xml"))
        .expect(2)
        .mount(&origin)
        .await;

    let resolver = FaviconResolver::new(HostGuard::default(), FaviconSettings::default())
        .expect("favicon resolver");
    let first = resolver.resolve(&origin.uri()).await.expect("first");
    let second = resolver.resolve(&origin.uri()).await.expect("second");
    assert_eq!(first, second);
    assert_eq!(first.content_type, "image/svg+xml");
}
