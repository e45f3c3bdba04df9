//! HTTP surface of the gateway.
//!
//! This module is organized into submodules:
//! - `proxy` - identity-provider API proxy (/api/kani)
//! - `favicon` - favicon discovery (/api/fetch-icon)
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod favicon;
pub mod health;
pub mod openapi;
pub mod proxy;

pub use favicon::FAVICON_TAG;
pub use health::MISC_TAG;
pub use proxy::PROXY_TAG;

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::favicon::{FaviconResolver, FaviconSettings};
use crate::proxy::{IdentityProxy, UpstreamClient, UpstreamSettings};
use crate::security::{HostGuard, JsonLimits, PathAllowlist};
use crate::token::TokenSource;
use axum::extract::DefaultBodyLimit;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Largest inbound request body accepted (image uploads included).
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// Shared state for all handlers. Everything in here is immutable or
/// internally synchronised, so it is cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<IdentityProxy>,
    pub favicons: Arc<FaviconResolver>,
    pub json_limits: JsonLimits,
}

impl AppState {
    pub fn new(proxy: IdentityProxy, favicons: FaviconResolver) -> Self {
        Self {
            proxy: Arc::new(proxy),
            favicons: Arc::new(favicons),
            json_limits: JsonLimits::with_max_bytes(MAX_REQUEST_BYTES),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self, GatewayError> {
        let upstream = UpstreamClient::new(UpstreamSettings::from(&config.upstream))?;
        let proxy = IdentityProxy::new(PathAllowlist::default(), tokens, upstream);
        let favicons = FaviconResolver::new(
            HostGuard::default(),
            FaviconSettings::from(&config.favicon),
        )?;
        Ok(Self::new(proxy, favicons))
    }
}

/// Build the full application router, including the Redoc UI at `/api-docs`.
pub fn app(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .routes(routes!(proxy::proxy_request))
        .routes(routes!(favicon::fetch_icon))
        .routes(routes!(health::health))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on `bind_address`.
#[tracing::instrument(skip(state))]
pub async fn start_webserver(state: AppState, bind_address: &str) -> color_eyre::Result<()> {
    let router = app(state);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(addr = %bind_address, "Server running");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
