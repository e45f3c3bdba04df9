//! Inbound proxy request shapes.
//!
//! The browser sends either a JSON body or a multipart form carrying the same
//! JSON in a `json` field plus an optional `image` file. Both are resolved
//! into a [`RequestEnvelope`] once, at the HTTP boundary.

use crate::error::GatewayError;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

/// Wire form of a proxy call, as sent by the console.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// One of GET, POST, PUT, PATCH, DELETE. Defaults to GET.
    #[serde(default)]
    pub method: Option<String>,
    /// API path relative to the identity-provider base URL, e.g. `v1/oauth2`.
    #[serde(default)]
    #[schema(value_type = String)]
    pub path: Option<Value>,
    /// JSON payload, or base64-encoded bytes when `contentType` is set.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub body: Option<Value>,
    /// Content type of a base64-encoded binary `body`.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// File part re-packaged into the outbound multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Empty,
    Json(Value),
    Binary { bytes: Bytes, content_type: String },
    Multipart { image: Option<FilePart> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub method: Method,
    /// `None` when the caller sent no path or a non-string one.
    pub path: Option<String>,
    pub payload: RequestPayload,
}

/// Browsers do not always pad the base64 they produce, so padding is optional.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const ALLOWED_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

pub fn parse_method(raw: Option<&str>) -> Result<Method, GatewayError> {
    let Some(raw) = raw else {
        return Ok(Method::GET);
    };
    let method = Method::from_bytes(raw.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| GatewayError::BadInput(format!("Invalid method: {raw}")))?;
    if ALLOWED_METHODS.contains(&method) {
        Ok(method)
    } else {
        Err(GatewayError::BadInput(format!("Method not supported: {raw}")))
    }
}

fn path_of(request: &ProxyRequest) -> Option<String> {
    request
        .path
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Whether a `body` counts as supplied. `null`, `false`, `0` and `""` do not.
fn is_present(body: &Value) -> bool {
    match body {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl RequestEnvelope {
    /// Envelope for a plain JSON call.
    ///
    /// A string `body` accompanied by a non-empty `contentType` is base64
    /// binary; any other supplied `body` is forwarded as JSON.
    pub fn from_json(request: ProxyRequest) -> Result<Self, GatewayError> {
        let method = parse_method(request.method.as_deref())?;
        let path = path_of(&request);

        let body = request.body.filter(is_present);
        let content_type = request.content_type.filter(|ct| !ct.is_empty());
        let payload = match (body, content_type) {
            (Some(Value::String(encoded)), Some(content_type)) => {
                HeaderValue::from_str(&content_type)
                    .map_err(|_| GatewayError::BadInput("Invalid contentType".into()))?;
                let compact: String = encoded
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                let bytes = LENIENT_BASE64
                    .decode(compact)
                    .map_err(|e| GatewayError::BadInput(format!("Invalid base64 body: {e}")))?;
                RequestPayload::Binary {
                    bytes: Bytes::from(bytes),
                    content_type,
                }
            }
            (None, _) => RequestPayload::Empty,
            (Some(body), _) => RequestPayload::Json(body),
        };

        Ok(Self {
            method,
            path,
            payload,
        })
    }

    /// Envelope for an asset upload. Only the image travels upstream.
    pub fn from_multipart(
        request: ProxyRequest,
        image: Option<FilePart>,
    ) -> Result<Self, GatewayError> {
        let method = parse_method(request.method.as_deref())?;
        let path = path_of(&request);
        if let Some(ct) = image.as_ref().and_then(|i| i.content_type.as_deref()) {
            HeaderValue::from_str(ct)
                .map_err(|_| GatewayError::BadInput("Invalid image content type".into()))?;
        }
        Ok(Self {
            method,
            path,
            payload: RequestPayload::Multipart { image },
        })
    }
}
