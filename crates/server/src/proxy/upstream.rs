use crate::config::UpstreamConfig;
use crate::error::{FetchError, GatewayError};
use crate::fetch::{content_type_of, read_capped};
use crate::proxy::envelope::{RequestEnvelope, RequestPayload};
use crate::security::{JsonLimits, parse_bounded};
use crate::token::CachedToken;
use axum::http::StatusCode;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;
use utoipa::ToSchema;

/// Normalised upstream reply returned to the console.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProxyResponse {
    pub status: u16,
    /// Parsed JSON when upstream said `json`, otherwise the raw text.
    #[schema(value_type = Object)]
    pub body: Value,
}

/// Raw upstream reply before normalisation.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: Bytes,
}

impl UpstreamReply {
    /// Interpret the body according to the upstream content type.
    ///
    /// A JSON content type whose body does not parse is passed back as text.
    pub fn normalize(&self, limits: &JsonLimits) -> ProxyResponse {
        let text = || Value::String(String::from_utf8_lossy(&self.body).into_owned());
        let body = if self.content_type.to_ascii_lowercase().contains("json") {
            if self.body.iter().all(u8::is_ascii_whitespace) {
                Value::Null
            } else {
                match parse_bounded(&self.body, limits) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(
                            name = "proxy.upstream_json_invalid",
                            status = self.status.as_u16(),
                            error = %e,
                            "Upstream declared JSON but the body did not parse; returning text"
                        );
                        text()
                    }
                }
            }
        } else {
            text()
        };
        ProxyResponse {
            status: self.status.as_u16(),
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub max_response_bytes: usize,
}

impl From<&UpstreamConfig> for UpstreamSettings {
    fn from(cfg: &UpstreamConfig) -> Self {
        Self {
            base_url: cfg.normalized_base_url(),
            timeout: cfg.timeout(),
            max_response_bytes: cfg.max_response_bytes,
        }
    }
}

/// HTTP client bound to the identity-provider API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    settings: UpstreamSettings,
}

impl UpstreamClient {
    pub fn new(settings: UpstreamSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::Internal(format!("upstream client: {e}")))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &UpstreamSettings {
        &self.settings
    }

    /// `{base_url}/{path}`. The path must already have passed the allowlist.
    pub fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Url::parse(&format!("{}/{}", self.settings.base_url, path))
            .map_err(|e| GatewayError::BadInput(format!("Invalid path: {e}")))
    }

    /// Forward one request with the bearer token as the only credential.
    #[tracing::instrument(
        name = "proxy.upstream",
        level = "debug",
        skip(self, envelope, token),
        fields(method = %envelope.method)
    )]
    pub async fn send(
        &self,
        envelope: RequestEnvelope,
        path: &str,
        token: &CachedToken,
    ) -> Result<UpstreamReply, GatewayError> {
        let url = self.endpoint(path)?;
        let mut request = self
            .client
            .request(envelope.method, url)
            .bearer_auth(token.value());

        request = match envelope.payload {
            RequestPayload::Empty => request,
            RequestPayload::Json(value) => {
                let encoded = serde_json::to_vec(&value)
                    .map_err(|e| GatewayError::Internal(format!("encoding body: {e}")))?;
                request
                    .header(CONTENT_TYPE, "application/json")
                    .body(encoded)
            }
            RequestPayload::Binary {
                bytes,
                content_type,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
            RequestPayload::Multipart { image } => {
                let mut form = Form::new();
                if let Some(image) = image {
                    let mut part = Part::bytes(image.bytes.to_vec());
                    if let Some(name) = image.file_name {
                        part = part.file_name(name);
                    }
                    if let Some(ct) = image.content_type {
                        part = part.mime_str(&ct).map_err(|_| {
                            GatewayError::BadInput("Invalid image content type".into())
                        })?;
                    }
                    form = form.part("image", part);
                }
                request.multipart(form)
            }
        };

        let timeout = self.settings.timeout;
        let exchange = async {
            let response = request
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout))?;
            let status = response.status();
            let content_type = content_type_of(&response);
            let body = read_capped(response, self.settings.max_response_bytes, timeout).await?;
            Ok::<_, FetchError>(UpstreamReply {
                status,
                content_type,
                body,
            })
        };
        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| GatewayError::UpstreamTimeout(timeout))??;
        Ok(reply)
    }
}
