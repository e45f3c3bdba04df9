use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Identity-provider API the proxy forwards to.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Static service-account token. Mutually exclusive with `token_file`.
    #[serde(default)]
    pub token: Option<String>,
    /// File holding the service-account token, re-read every `token_refresh_secs`.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(default = "default_token_refresh_secs")]
    pub token_refresh_secs: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl UpstreamConfig {
    /// Base URL without a trailing slash, ready for `{base}/{path}` joins.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaviconConfig {
    #[serde(default = "default_favicon_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_favicon_timeout_secs(),
            max_image_bytes: default_max_image_bytes(),
            max_html_bytes: default_max_html_bytes(),
            max_candidates: default_max_candidates(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub favicon: FaviconConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_token_refresh_secs() -> u64 {
    300
}

fn default_upstream_timeout_secs() -> u64 {
    10
}

fn default_max_response_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_favicon_timeout_secs() -> u64 {
    3
}

fn default_max_image_bytes() -> usize {
    1024 * 1024
}

fn default_max_html_bytes() -> usize {
    512 * 1024
}

fn default_max_candidates() -> usize {
    8
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    crate::favicon::DEFAULT_USER_AGENT.to_string()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.upstream.normalized_base_url();
        let parsed = Url::parse(&base).map_err(|e| {
            ConfigError::Validation(format!("upstream.base_url is not a valid URL: {e}"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::Validation(
                "upstream.base_url must use http or https".into(),
            ));
        }

        match (&self.upstream.token, &self.upstream.token_file) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::Validation(
                    "set only one of upstream.token and upstream.token_file".into(),
                ));
            }
            (None, None) => {
                return Err(ConfigError::Validation(
                    "one of upstream.token or upstream.token_file is required".into(),
                ));
            }
            (Some(token), None) if token.trim().is_empty() => {
                return Err(ConfigError::Validation("upstream.token is empty".into()));
            }
            _ => {}
        }

        if self.upstream.timeout_secs == 0 || self.favicon.timeout_secs == 0 {
            return Err(ConfigError::Validation("timeouts must be > 0".into()));
        }
        if self.upstream.token_file.is_some() && self.upstream.token_refresh_secs == 0 {
            return Err(ConfigError::Validation(
                "upstream.token_refresh_secs must be > 0".into(),
            ));
        }
        if self.upstream.max_response_bytes == 0
            || self.favicon.max_image_bytes == 0
            || self.favicon.max_html_bytes == 0
        {
            return Err(ConfigError::Validation("size caps must be > 0".into()));
        }
        Ok(())
    }
}

/// Load configuration from `config.yaml` (or the file named by `GATEWAY_CONFIG`)
/// plus environment overrides.
///
/// Environment variables override file values using `__` as the key path
/// separator, e.g. `UPSTREAM__BASE_URL` or `FAVICON__TIMEOUT_SECS`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let path = std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let cfg = Config::builder()
        .add_source(File::with_name(&path).required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for the binary, which has nothing better to do than exit.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
