use anyhow::{Context as _, Result};
use arc_swap::ArcSwap;
use clap::{Parser, Subcommand};
use relaygate_auth::{HttpTokenEndpoint, OAuthTokenManager};
use relaygate_config::{Config, ConfigWatcher, LogConfig, LogFormat};
use relaygate_provider::ModelRouter;
use relaygate_proxy::{AppState, build_http_client};
use relaygate_store::{InMemoryCredentialStore, UpstashCredentialStore};
use relaygate_types::{CredentialStore, ProviderId};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "relaygate",
    version,
    about = "relaygate: OpenAI-compatible gateway over OAuth and API-key LLM backends"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve {
        /// Override the listening port (default: 8018).
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listening address (default: 127.0.0.1).
        #[arg(long)]
        host: Option<String>,
        /// Reload the configuration file when it changes.
        #[arg(long, requires = "config")]
        watch: bool,
    },
    /// Print the exposed model list as JSON.
    Models,
    /// Acquire an access token and print its expiry (never the token).
    Token {
        /// Provider name (claude-max / openai-codex).
        provider: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("config error: {e}"))?;
    init_tracing(&config.log);

    match cli.command {
        Commands::Serve { port, host, watch } => {
            cmd_serve(config, cli.config, port, host, watch).await
        }
        Commands::Models => cmd_models(&config),
        Commands::Token { provider } => cmd_token(config, &provider).await,
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Upstash when configured, otherwise a process-local cache.
fn open_store(config: &Config, http: &rquest::Client) -> Arc<dyn CredentialStore> {
    match (&config.cache.upstash_url, &config.cache.upstash_token) {
        (Some(url), Some(token)) => {
            tracing::info!("using Upstash credential cache");
            Arc::new(UpstashCredentialStore::new(http.clone(), url, token))
        }
        _ => {
            tracing::info!("using in-memory credential cache");
            Arc::new(InMemoryCredentialStore::new())
        }
    }
}

/// The manager reads the `oauth` section from `config` on every refresh.
fn token_manager(config: Arc<ArcSwap<Config>>, http: &rquest::Client) -> Arc<OAuthTokenManager> {
    let store = open_store(&config.load(), http);
    Arc::new(OAuthTokenManager::new(
        store,
        Arc::new(HttpTokenEndpoint::new(http.clone())),
        config,
    ))
}

async fn cmd_serve(
    config: Config,
    config_path: Option<PathBuf>,
    port: Option<u16>,
    host: Option<String>,
    watch: bool,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| config.host.clone()),
        port.unwrap_or(config.port)
    );
    let http = build_http_client(config.proxy_url.as_deref());

    let shared = match config_path.filter(|_| watch) {
        Some(path) => {
            let watcher = Arc::new(
                ConfigWatcher::new(path).map_err(|e| anyhow::anyhow!("config error: {e}"))?,
            );
            let shared = watcher.arc();
            watcher.watch();
            shared
        }
        None => Arc::new(ArcSwap::from_pointee(config)),
    };

    let auth = token_manager(Arc::clone(&shared), &http);
    let app = relaygate_proxy::make_router(AppState::new(shared, auth));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "relaygate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

fn cmd_models(config: &Config) -> Result<()> {
    let list = ModelRouter::new(config).models();
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

async fn cmd_token(config: Config, provider: &str) -> Result<()> {
    let provider = provider.parse::<ProviderId>().map_err(|_| {
        let known: Vec<String> = ProviderId::all().iter().map(ToString::to_string).collect();
        anyhow::anyhow!(
            "unknown provider '{provider}', expected one of: {}",
            known.join(", ")
        )
    })?;
    let http = build_http_client(config.proxy_url.as_deref());
    let grant = token_manager(Arc::new(ArcSwap::from_pointee(config)), &http)
        .access_token(provider)
        .await
        .with_context(|| format!("failed to acquire a token for {provider}"))?;
    println!("{provider}: token valid for {}s", grant.expires_in_secs());
    if let Some(account) = &grant.account_id {
        println!("account: {account}");
    }
    Ok(())
}
