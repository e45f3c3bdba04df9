//! Bearer credential used for identity-provider API calls.
//!
//! Acquisition is someone else's job: the proxy only ever reads the current
//! token through [`TokenSource`]. [`TokenCache`] holds an immutable
//! [`CachedToken`] behind an `Arc` that writers swap wholesale, so concurrent
//! readers never observe a half-updated record.

use crate::error::TokenError;
use parking_lot::RwLock;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct CachedToken {
    value: String,
    expiry: Option<OffsetDateTime>,
}

impl CachedToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expiry: None,
        }
    }

    pub fn with_expiry(value: impl Into<String>, expiry: OffsetDateTime) -> Self {
        Self {
            value: value.into(),
            expiry: Some(expiry),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

// Never print the credential itself.
impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Read side of the token collaborator.
pub trait TokenSource: Send + Sync {
    fn get_token(&self) -> Result<Arc<CachedToken>, TokenError>;
}

#[derive(Default)]
pub struct TokenCache {
    current: RwLock<Option<Arc<CachedToken>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: CachedToken) -> Self {
        let cache = Self::new();
        cache.store(token);
        cache
    }

    /// Replace the cached record. Readers holding the previous `Arc` keep it.
    pub fn store(&self, token: CachedToken) {
        *self.current.write() = Some(Arc::new(token));
    }
}

impl TokenSource for TokenCache {
    fn get_token(&self) -> Result<Arc<CachedToken>, TokenError> {
        let token = self.current.read().clone().ok_or(TokenError::Unavailable)?;
        if token.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(TokenError::Expired);
        }
        Ok(token)
    }
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("current", &*self.current.read())
            .finish()
    }
}

/// Read a service-account token from `path`, trimming surrounding whitespace.
pub fn load_token_file(path: &Path) -> Result<CachedToken, TokenError> {
    let raw = std::fs::read_to_string(path)?;
    let value = raw.trim();
    if value.is_empty() {
        return Err(TokenError::EmptyFile(path.to_path_buf()));
    }
    Ok(CachedToken::new(value))
}

/// Re-read `path` every `every` and swap the result into `cache`.
///
/// A failed read keeps the previous token in place.
pub async fn refresh_from_file(cache: Arc<TokenCache>, path: PathBuf, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        match load_token_file(&path) {
            Ok(token) => {
                cache.store(token);
                tracing::debug!(path = %path.display(), "Reloaded upstream token");
            }
            Err(e) => {
                tracing::error!(
                    name = "token.refresh.failed",
                    path = %path.display(),
                    error = %e,
                    "Failed to reload upstream token; keeping previous value"
                );
            }
        }
    }
}
