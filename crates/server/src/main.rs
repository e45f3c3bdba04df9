use idm_console_gateway::api::{AppState, start_webserver};
use idm_console_gateway::config::load_config_or_panic;
use idm_console_gateway::token::{CachedToken, TokenCache, load_token_file, refresh_from_file};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "idm_console_gateway=info,hyper=warn,reqwest=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; real deployments set the environment directly.
    let _ = dotenvy::dotenv();

    initialize_standard_tracing();

    let config = load_config_or_panic();

    let tokens = Arc::new(TokenCache::new());
    match (&config.upstream.token, &config.upstream.token_file) {
        (Some(token), _) => tokens.store(CachedToken::new(token.trim())),
        (None, Some(path)) => {
            tokens.store(load_token_file(path)?);
            let every = config.upstream.token_refresh_interval();
            tracing::info!(path = %path.display(), every_secs = every.as_secs(), "Watching upstream token file");
            tokio::spawn(refresh_from_file(tokens.clone(), path.clone(), every));
        }
        (None, None) => color_eyre::eyre::bail!("no upstream token source configured"),
    }

    tracing::info!(
        upstream = %config.upstream.normalized_base_url(),
        upstream_timeout_secs = config.upstream.timeout_secs,
        favicon_timeout_secs = config.favicon.timeout_secs,
        "gateway configuration"
    );

    let state = AppState::from_config(&config, tokens)?;
    start_webserver(state, &config.bind_address).await?;
    Ok(())
}
