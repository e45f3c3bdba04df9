//! Allowlisted identity-provider API proxy.
//!
//! - `envelope` - inbound request shapes (JSON / multipart) and their validation
//! - `upstream` - outbound client and response normalisation

pub mod envelope;
pub mod upstream;

pub use envelope::{FilePart, ProxyRequest, RequestEnvelope, RequestPayload};
pub use upstream::{ProxyResponse, UpstreamClient, UpstreamReply, UpstreamSettings};

use crate::error::GatewayError;
use crate::security::{JsonLimits, PathAllowlist};
use crate::token::TokenSource;
use std::sync::Arc;

/// Normalised reply plus the upstream content type to echo back.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyReply {
    pub response: ProxyResponse,
    pub content_type: String,
}

#[derive(Clone)]
pub struct IdentityProxy {
    allowlist: PathAllowlist,
    tokens: Arc<dyn TokenSource>,
    upstream: UpstreamClient,
}

impl IdentityProxy {
    pub fn new(
        allowlist: PathAllowlist,
        tokens: Arc<dyn TokenSource>,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            allowlist,
            tokens,
            upstream,
        }
    }

    /// Validate, authorise and forward one request.
    ///
    /// A disallowed path fails with [`GatewayError::Forbidden`] before the
    /// token is read or any connection is made. Non-2xx upstream replies are
    /// not errors: they come back as a [`ProxyReply`] carrying that status.
    #[tracing::instrument(
        name = "proxy.handle",
        skip(self, envelope),
        fields(method = %envelope.method, path = ?envelope.path)
    )]
    pub async fn handle(&self, envelope: RequestEnvelope) -> Result<ProxyReply, GatewayError> {
        let path = envelope.path.clone().unwrap_or_default();
        if let Err(reason) = self.allowlist.check(&path) {
            tracing::warn!(
                name = "security.path_forbidden",
                path = %path,
                reason = ?reason,
                "Blocked proxy request to disallowed path"
            );
            return Err(GatewayError::Forbidden(path));
        }

        let token = self.tokens.get_token().map_err(|e| {
            tracing::error!(
                name = "proxy.token_unavailable",
                error = %e,
                "No usable upstream credential"
            );
            GatewayError::from(e)
        })?;

        let method = envelope.method.clone();
        let reply = self.upstream.send(envelope, &path, &token).await?;
        if !reply.status.is_success() {
            tracing::debug!(
                method = %method,
                path = %path,
                status = reply.status.as_u16(),
                "Upstream returned an error status"
            );
        }

        let limits = JsonLimits::with_max_bytes(self.upstream.settings().max_response_bytes);
        Ok(ProxyReply {
            response: reply.normalize(&limits),
            content_type: reply.content_type,
        })
    }
}
