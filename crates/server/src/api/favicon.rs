//! Favicon discovery endpoint.

use crate::api::AppState;
use crate::error::GatewayError;
use crate::security::{JsonLimits, parse_bounded};
use axum::{
    Json,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const FAVICON_TAG: &str = "Favicon";

pub const FAVICON_CACHE_CONTROL: &str = "public, max-age=3600";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct FaviconRequest {
    /// Site origin, e.g. `https://grafana.example.com`. Path and query are ignored.
    #[serde(default)]
    #[schema(value_type = String)]
    pub origin: Option<Value>,
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/api/fetch-icon",
    tag = FAVICON_TAG,
    operation_id = "Fetch Favicon",
    summary = "Locate and return the favicon of an origin",
    description = "Probes `/favicon.png`, `/favicon.svg` and `/favicon.ico` under the origin, then \
                   falls back to `<link rel=\"icon\">` hints in any HTML returned. Cloud metadata \
                   endpoints and non-HTTP schemes are never fetched.",
    request_body(content = FaviconRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "The icon image; cached for one hour", content_type = "image/*"),
        (status = 400, description = "Missing or invalid origin", content_type = "application/json"),
        (status = 403, description = "Origin not allowed", content_type = "application/json"),
        (status = 404, description = "No favicon found", content_type = "application/json"),
        (status = 500, description = "Unexpected failure", content_type = "application/json")
    )
)]
pub async fn fetch_icon(State(state): State<AppState>, body: Bytes) -> Response {
    let origin = match parse_origin(&body, &state.json_limits) {
        Ok(origin) => origin,
        Err(e) => return favicon_error(e),
    };

    match state.favicons.resolve(&origin).await {
        Ok(image) => {
            let content_type = HeaderValue::from_str(&image.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                [
                    (CONTENT_TYPE, content_type),
                    (CACHE_CONTROL, HeaderValue::from_static(FAVICON_CACHE_CONTROL)),
                ],
                image.bytes,
            )
                .into_response()
        }
        Err(e) => favicon_error(e),
    }
}

fn parse_origin(body: &[u8], limits: &JsonLimits) -> Result<String, GatewayError> {
    let invalid_body = || GatewayError::BadInput("Invalid JSON body".into());
    let value = parse_bounded(body, limits).map_err(|_| invalid_body())?;
    let request: FaviconRequest = serde_json::from_value(value).map_err(|_| invalid_body())?;
    match request.origin {
        Some(Value::String(origin)) if !origin.trim().is_empty() => Ok(origin),
        None | Some(Value::Null) | Some(Value::String(_)) => {
            Err(GatewayError::BadInput("Origin is required".into()))
        }
        Some(_) => Err(GatewayError::BadInput("Invalid origin URL".into())),
    }
}

fn favicon_error(err: GatewayError) -> Response {
    let (status, message) = match &err {
        GatewayError::BadInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        GatewayError::Forbidden(_) => (StatusCode::FORBIDDEN, "Origin not allowed".to_string()),
        GatewayError::NotFound => (
            StatusCode::NOT_FOUND,
            "No favicon found at the common locations or in HTML".to_string(),
        ),
        _ => {
            tracing::error!(
                name = "api.fetch_icon.failed",
                error = %err,
                "Error fetching favicon"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server error while fetching favicon".to_string(),
            )
        }
    };
    (status, Json(json!({ "error": message }))).into_response()
}
