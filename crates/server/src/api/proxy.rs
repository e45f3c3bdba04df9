//! Identity-provider API proxy endpoint.
//!
//! Accepts either a JSON envelope or a multipart form (`json` field plus an
//! optional `image` file) and answers with `{status, body}` where `status` is
//! the upstream status code.

use crate::api::AppState;
use crate::error::GatewayError;
use crate::proxy::{FilePart, ProxyRequest, ProxyResponse, RequestEnvelope};
use crate::security::{JsonLimits, parse_bounded};
use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::{HeaderValue, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde_json::json;

/// Tag for OpenAPI documentation.
pub const PROXY_TAG: &str = "Identity Provider Proxy";

#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/api/kani",
    tag = PROXY_TAG,
    operation_id = "Proxy Identity Provider Request",
    summary = "Forward a request to the identity-provider API",
    description = "Forwards `method` + `path` to the identity-provider API with the gateway's \
                   service-account token attached. Only OAuth2 application, group, person and \
                   account resources may be addressed.\n\n\
                   Image uploads use `multipart/form-data` instead: a `json` field holding this \
                   same envelope plus an `image` file field.\n\n\
                   The response `status` is the upstream status and the upstream `content-type` \
                   is echoed.",
    request_body(content = ProxyRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Upstream reply, whatever its status", body = ProxyResponse),
        (status = 400, description = "Malformed envelope", body = ProxyResponse),
        (status = 403, description = "Path not allowed", body = ProxyResponse),
        (status = 500, description = "Internal error", body = ProxyResponse),
        (status = 502, description = "Upstream unreachable", body = ProxyResponse),
        (status = 504, description = "Upstream timed out", body = ProxyResponse)
    )
)]
pub async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    let envelope = match read_envelope(&state, request).await {
        Ok(envelope) => envelope,
        Err(e) => return proxy_error(e),
    };

    match state.proxy.handle(envelope).await {
        Ok(reply) => {
            let content_type = if reply.content_type.is_empty() {
                HeaderValue::from_static("application/json")
            } else {
                HeaderValue::from_str(&reply.content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static("application/json"))
            };
            let mut response = Json(reply.response).into_response();
            response.headers_mut().insert(CONTENT_TYPE, content_type);
            response
        }
        Err(e) => proxy_error(e),
    }
}

/// Resolve the inbound body into an envelope exactly once.
async fn read_envelope(state: &AppState, request: Request) -> Result<RequestEnvelope, GatewayError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| GatewayError::BadInput(e.body_text()))?;
        read_multipart(multipart, &state.json_limits).await
    } else {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| GatewayError::BadInput(e.body_text()))?;
        RequestEnvelope::from_json(parse_envelope_json(&body, &state.json_limits)?)
    }
}

async fn read_multipart(
    mut multipart: Multipart,
    limits: &JsonLimits,
) -> Result<RequestEnvelope, GatewayError> {
    let mut envelope_json: Option<Bytes> = None;
    let mut image: Option<FilePart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::BadInput(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("json") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::BadInput(e.body_text()))?;
                envelope_json = Some(bytes);
            }
            Some("image") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GatewayError::BadInput(e.body_text()))?;
                // Browsers send an empty, unnamed part when no file was chosen.
                if !bytes.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    image = Some(FilePart {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }

    let envelope_json = envelope_json
        .ok_or_else(|| GatewayError::BadInput("Multipart request is missing the json field".into()))?;
    RequestEnvelope::from_multipart(parse_envelope_json(&envelope_json, limits)?, image)
}

fn parse_envelope_json(body: &[u8], limits: &JsonLimits) -> Result<ProxyRequest, GatewayError> {
    let value = parse_bounded(body, limits)
        .map_err(|e| GatewayError::BadInput(format!("Invalid JSON body: {e}")))?;
    serde_json::from_value(value)
        .map_err(|e| GatewayError::BadInput(format!("Invalid request envelope: {e}")))
}

/// Render a failure in the same `{status, body}` shape as a proxied reply.
fn proxy_error(err: GatewayError) -> Response {
    let status = err.status_code();
    let message = match &err {
        GatewayError::BadInput(msg) => msg.clone(),
        GatewayError::Forbidden(_) => "Path not allowed".to_string(),
        GatewayError::UpstreamTimeout(_) => "Upstream request timed out".to_string(),
        GatewayError::UpstreamFailure(_) => {
            tracing::error!(
                name = "api.proxy.upstream_failed",
                error = %err,
                "Upstream request failed"
            );
            "Upstream request failed".to_string()
        }
        GatewayError::NotFound => "Not found".to_string(),
        GatewayError::Internal(_) => {
            tracing::error!(
                name = "api.proxy.internal",
                error = %err,
                "Proxy request failed"
            );
            "Internal server error".to_string()
        }
    };
    (
        status,
        Json(json!({ "status": status.as_u16(), "body": message })),
    )
        .into_response()
}
