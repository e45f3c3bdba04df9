use axum::http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single outbound fetch.
///
/// During favicon discovery these are never surfaced to the caller: a failed
/// candidate just means "try the next one".
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network timeout after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Blocked outbound request to {0}")]
    Blocked(String),
    #[error("Redirect limit of {0} exceeded")]
    RedirectLimit(usize),
}

impl FetchError {
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("No bearer token has been loaded yet")]
    Unavailable,
    #[error("Cached bearer token has expired")]
    Expired,
    #[error("Token file {0} is empty")]
    EmptyFile(PathBuf),
    #[error("Failed to read token file: {0}")]
    Io(#[from] std::io::Error),
}

/// Request-level error taxonomy shared by the proxy and favicon endpoints.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Bad input: {0}")]
    BadInput(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Upstream failure: {0}")]
    UpstreamFailure(String),
    #[error("Upstream timeout after {0:?}")]
    UpstreamTimeout(Duration),
    #[error("No favicon found")]
    NotFound,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BadInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FetchError> for GatewayError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(after) => GatewayError::UpstreamTimeout(after),
            FetchError::Blocked(url) => GatewayError::Forbidden(url),
            other => GatewayError::UpstreamFailure(other.to_string()),
        }
    }
}

impl From<TokenError> for GatewayError {
    fn from(err: TokenError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}
