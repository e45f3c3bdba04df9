//! Shared helpers for outbound HTTP responses.

use crate::error::FetchError;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// The response's `content-type` header, or an empty string.
pub fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Stream the body into memory, giving up as soon as it grows past `limit`.
#[tracing::instrument(level = "debug", skip(response), fields(url = %response.url()))]
pub async fn read_capped(
    response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<Bytes, FetchError> {
    if response
        .content_length()
        .is_some_and(|declared| declared > limit as u64)
    {
        return Err(FetchError::TooLarge { limit });
    }

    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::from_reqwest(e, timeout))?;
        if body.len() + chunk.len() > limit {
            return Err(FetchError::TooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}
