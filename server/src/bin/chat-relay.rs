use anyhow::{Context, Result};
use chat_relay_core::config::get_default_config_file;
use chat_relay_core::{
    ConfigOverrides, RelayConfig, ServiceAccountTokenProvider, SessionBackend, TokenProviderRef, VertexClient,
};
use chat_relay_server::http_server::{self, AppState};
use chat_relay_server::session::{InMemorySessionStore, SessionStoreRef, SignedCookieSessionStore};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const APP_NAME: &str = "chat-relay";
const SESSION_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Parser, Debug)]
#[command(name = "chat-relay", about = "Web chat relay for Vertex AI generative models", version)]
struct Args {
    /// Path to a TOML config file (defaults to ~/.config/chat-relay/config.toml if present)
    #[arg(short, long, env = "CHAT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Cloud project identifier
    #[arg(long, env = "PROJECT_ID")]
    project_id: Option<String>,

    /// Vertex AI region
    #[arg(long, env = "LOCATION")]
    location: Option<String>,

    /// Model identifier
    #[arg(short, long, env = "MODEL")]
    model: Option<String>,

    /// Path to the service-account JSON key
    #[arg(long, env = "SERVICE_ACCOUNT_FILE")]
    service_account_file: Option<PathBuf>,

    /// Secret used to sign session cookies (falls back to FLASK_SECRET_KEY)
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Instructions prepended to every conversation
    #[arg(short, long, env = "SYSTEM_PROMPT")]
    system_prompt: Option<String>,

    /// Interface to listen on
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, env = "TEMPERATURE")]
    temperature: Option<f64>,

    #[arg(long, env = "MAX_OUTPUT_TOKENS")]
    max_output_tokens: Option<u32>,

    /// Upper bound on one upstream call, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Override the regional API host (e.g. a private endpoint)
    #[arg(long, env = "API_BASE_URL")]
    api_base_url: Option<String>,

    /// Session storage: "cookie" or "memory"
    #[arg(long, env = "SESSION_BACKEND")]
    session_backend: Option<SessionBackend>,

    /// Session lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECS")]
    session_ttl_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CHAT_RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    /// Flags and environment values that were actually given
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            project_id: self.project_id.clone(),
            location: self.location.clone(),
            model_name: self.model.clone(),
            service_account_file: self.service_account_file.clone(),
            secret_key: self.secret_key.clone(),
            system_prompt: self.system_prompt.clone(),
            host: self.host.clone(),
            port: self.port,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            request_timeout_secs: self.request_timeout_secs,
            api_base_url: self.api_base_url.clone(),
            session_backend: self.session_backend,
            session_ttl_secs: self.session_ttl_secs,
        }
        .with_legacy_secret(|name| std::env::var(name).ok())
    }
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => get_default_config_file(APP_NAME).ok(),
    };

    let base = match &path {
        Some(path) => {
            let config = RelayConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            if path.exists() {
                info!("Loaded configuration from {}", path.display());
            }
            config
        }
        None => RelayConfig::default(),
    };

    let config = base.merge(&args.overrides());
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_session_store(config: &RelayConfig) -> Result<SessionStoreRef> {
    let ttl = chrono::Duration::from_std(config.session_ttl())
        .context("Session TTL out of range")?;

    let store: SessionStoreRef = match config.session_backend {
        SessionBackend::Cookie => Arc::new(SignedCookieSessionStore::new(&config.secret_key, ttl)),
        SessionBackend::Memory => {
            let store = Arc::new(InMemorySessionStore::new(ttl));
            let sweeper = store.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(SESSION_CLEANUP_INTERVAL);
                loop {
                    interval.tick().await;
                    if let Err(e) = sweeper.cleanup_expired_sessions() {
                        error!(error = %e, "Session cleanup failed");
                    }
                }
            });
            store
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting chat relay");

    let config = Arc::new(load_config(&args)?);
    if config.uses_default_secret() {
        warn!("Using the default session secret; set SECRET_KEY before exposing this server");
    }
    if !config.service_account_file.exists() {
        warn!(
            path = %config.service_account_file.display(),
            "Service account file not found; chat requests will fail until it exists"
        );
    }

    let tokens: TokenProviderRef = Arc::new(ServiceAccountTokenProvider::new(
        config.service_account_file.clone(),
    ));
    let client = VertexClient::new(config.clone(), tokens)?;
    info!(
        model = %config.model_name,
        location = %config.location,
        backend = %config.session_backend,
        "Initialized Vertex AI client"
    );

    let sessions = build_session_store(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let state = AppState::new(config, client, sessions);
    http_server::run_server(state, addr).await?;

    info!("Chat relay shutting down");
    Ok(())
}
