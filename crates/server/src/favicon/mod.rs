//! Best-effort favicon discovery for arbitrary third-party origins.
//!
//! Resolution probes a few conventional locations under the origin, falls
//! back to `<link rel="icon">` hints found in any HTML those probes return,
//! and yields the first response that is both successful and `image/*`.
//!
//! Every URL is vetted by [`HostGuard`] before it is fetched, including hrefs
//! harvested from remote HTML and every redirect hop: the target origin
//! controls that HTML, so it is as untrusted as the caller's input.

pub mod links;

use crate::config::FaviconConfig;
use crate::error::{FetchError, GatewayError};
use crate::fetch::{content_type_of, read_capped};
use crate::security::HostGuard;
use bytes::Bytes;
use reqwest::redirect::{Attempt, Policy};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub use links::{extract_icon_hrefs, resolve_href};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; KanidmOAuth2Manager/1.0)";

/// Probed in order under the normalised origin.
pub const WELL_KNOWN_PATHS: &[&str] = &["/favicon.png", "/favicon.svg", "/favicon.ico"];

#[derive(Debug, Clone)]
pub struct FaviconSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_image_bytes: usize,
    pub max_html_bytes: usize,
    pub max_candidates: usize,
    pub max_redirects: usize,
}

impl Default for FaviconSettings {
    fn default() -> Self {
        Self::from(&FaviconConfig::default())
    }
}

impl From<&FaviconConfig> for FaviconSettings {
    fn from(cfg: &FaviconConfig) -> Self {
        Self {
            user_agent: cfg.user_agent.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            max_image_bytes: cfg.max_image_bytes,
            max_html_bytes: cfg.max_html_bytes,
            max_candidates: cfg.max_candidates,
            max_redirects: cfg.max_redirects,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconImage {
    pub content_type: String,
    pub bytes: Bytes,
}

/// Outcome of one outbound GET.
#[derive(Debug)]
enum Probe {
    Image(FaviconImage),
    Html(String),
    Other { status: u16, content_type: String },
}

#[derive(Debug, Clone)]
pub struct FaviconResolver {
    client: reqwest::Client,
    guard: HostGuard,
    settings: FaviconSettings,
}

impl FaviconResolver {
    pub fn new(guard: HostGuard, settings: FaviconSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .redirect(guarded_redirects(guard.clone(), settings.max_redirects))
            .build()
            .map_err(|e| GatewayError::Internal(format!("favicon client: {e}")))?;
        Ok(Self {
            client,
            guard,
            settings,
        })
    }

    /// Reduce `origin` to scheme + host + port and vet it.
    pub fn normalize_origin(&self, origin: &str) -> Result<Url, GatewayError> {
        let origin = origin.trim();
        if origin.is_empty() {
            return Err(GatewayError::BadInput("Origin is required".into()));
        }
        let parsed =
            Url::parse(origin).map_err(|_| GatewayError::BadInput("Invalid origin URL".into()))?;
        if self.guard.is_blocked_url(&parsed) {
            return Err(GatewayError::Forbidden(origin.to_string()));
        }
        Url::parse(&parsed.origin().ascii_serialization())
            .map_err(|_| GatewayError::BadInput("Invalid origin URL".into()))
    }

    #[tracing::instrument(name = "favicon.resolve", skip(self), fields(origin = %origin))]
    pub async fn resolve(&self, origin: &str) -> Result<FaviconImage, GatewayError> {
        let base = self.normalize_origin(origin)?;
        let mut attempted: HashSet<Url> = HashSet::new();

        for path in WELL_KNOWN_PATHS {
            let url = base
                .join(path)
                .map_err(|e| GatewayError::Internal(format!("joining {path}: {e}")))?;
            if !attempted.insert(url.clone()) {
                debug!(url = %url, "Already tried as an HTML hint");
                continue;
            }

            match self.probe(&url, true).await {
                Ok(Probe::Image(image)) => return Ok(image),
                Ok(Probe::Html(html)) => {
                    if let Some(image) = self.try_html_hints(&base, &html, &mut attempted).await {
                        return Ok(image);
                    }
                }
                Ok(Probe::Other {
                    status,
                    content_type,
                }) => {
                    debug!(url = %url, status, content_type = %content_type, "Probe did not yield an icon");
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Probe failed; trying next location");
                }
            }
        }

        Err(GatewayError::NotFound)
    }

    async fn try_html_hints(
        &self,
        base: &Url,
        html: &str,
        attempted: &mut HashSet<Url>,
    ) -> Option<FaviconImage> {
        let hrefs = extract_icon_hrefs(html);
        debug!(count = hrefs.len(), "Found icon links in HTML");

        for href in hrefs.iter().take(self.settings.max_candidates) {
            let Some(candidate) = resolve_href(base, href) else {
                debug!(href = %href, "Skipping unresolvable icon href");
                continue;
            };
            if self.guard.is_blocked_url(&candidate) {
                continue;
            }
            if !attempted.insert(candidate.clone()) {
                continue;
            }
            match self.probe(&candidate, false).await {
                Ok(Probe::Image(image)) => return Some(image),
                Ok(other) => debug!(url = %candidate, outcome = ?other, "Icon candidate is not an image"),
                Err(e) => debug!(url = %candidate, error = %e, "Icon candidate failed"),
            }
        }
        None
    }

    /// GET `url`, reading the body only when it is an image or (if wanted) HTML.
    async fn probe(&self, url: &Url, want_html: bool) -> Result<Probe, FetchError> {
        let timeout = self.settings.timeout;
        let fut = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| FetchError::from_reqwest(e, timeout))?;
            let status = response.status();
            let content_type = content_type_of(&response);
            let lowered = content_type.to_ascii_lowercase();

            if status.is_success() && lowered.starts_with("image/") {
                let bytes = read_capped(response, self.settings.max_image_bytes, timeout).await?;
                return Ok(Probe::Image(FaviconImage {
                    content_type,
                    bytes,
                }));
            }
            if want_html && lowered.contains("html") {
                let body = read_capped(response, self.settings.max_html_bytes, timeout).await?;
                return Ok(Probe::Html(String::from_utf8_lossy(&body).into_owned()));
            }
            Ok(Probe::Other {
                status: status.as_u16(),
                content_type,
            })
        };
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }
}

/// Follow redirects only while every hop passes the host guard.
fn guarded_redirects(guard: HostGuard, max_redirects: usize) -> Policy {
    Policy::custom(move |attempt: Attempt| {
        if attempt.previous().len() > max_redirects {
            return attempt.error(FetchError::RedirectLimit(max_redirects));
        }
        if guard.is_blocked_url(attempt.url()) {
            let target = attempt.url().to_string();
            return attempt.error(FetchError::Blocked(target));
        }
        attempt.follow()
    })
}
