//! HTTP surface: axum router, route handlers, CORS and error mapping.
//!
//! Exposes the OpenAI-compatible `chat/completions` and `models` endpoints
//! under both `/v1` and `/api/v1`, plus usage statistics under
//! `/v0/management/usage`.

mod chat;
mod cors;
mod error;
mod models;
pub mod usage;

pub use chat::BACKEND_HEADER;
pub use error::ApiError;
pub use usage::UsageStats;

use arc_swap::ArcSwap;
use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};
use relaygate_auth::OAuthTokenManager;
use relaygate_config::Config;
use relaygate_provider::{BackendResolver, Gateway, HttpBackends};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use usage::UsageSnapshot;

/// Shared application state passed to all route handlers.
pub struct AppState {
    /// Atomically swappable for hot-reloading. Each request reads one snapshot.
    pub config: Arc<ArcSwap<Config>>,
    pub gateway: Gateway,
    pub usage: Arc<UsageStats>,
}

impl AppState {
    /// State backed by real HTTP backends.
    ///
    /// If the config specifies a `proxy_url`, upstream calls go through it.
    pub fn new(config: Arc<ArcSwap<Config>>, auth: Arc<OAuthTokenManager>) -> Arc<Self> {
        let http = build_http_client(config.load().proxy_url.as_deref());
        Self::with_backends(config, auth, Arc::new(HttpBackends::new(http)))
    }

    /// State with a custom backend resolver.
    pub fn with_backends(
        config: Arc<ArcSwap<Config>>,
        auth: Arc<OAuthTokenManager>,
        backends: Arc<dyn BackendResolver>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            gateway: Gateway::new(auth, backends),
            usage: Arc::new(UsageStats::new()),
        })
    }
}

/// Build an HTTP client, optionally configured with a proxy URL.
#[must_use]
pub fn build_http_client(proxy_url: Option<&str>) -> rquest::Client {
    if let Some(url) = proxy_url {
        match rquest::Proxy::all(url) {
            Ok(proxy) => {
                return rquest::Client::builder()
                    .proxy(proxy)
                    .build()
                    .unwrap_or_else(|_| rquest::Client::new());
            }
            Err(e) => {
                tracing::warn!(url = url, error = %e, "invalid proxy_url, using direct connection");
            }
        }
    }
    rquest::Client::new()
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/completions", post(chat::chat_completions))
        .route("/models", get(models::list_models))
}

/// Build the full axum router.
///
/// Routes (each under `/v1` and `/api/v1`):
/// - POST /chat/completions
/// - GET  /models
/// - OPTIONS on any route: CORS preflight, 204
///
/// Management:
/// - GET  /v0/management/usage
pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/v1", api_routes())
        .nest("/api/v1", api_routes())
        .route("/v0/management/usage", get(usage_handler))
        .with_state(state)
        .layer(middleware::from_fn(cors::cors))
        .layer(TraceLayer::new_for_http())
}

async fn usage_handler(State(state): State<Arc<AppState>>) -> Json<UsageSnapshot> {
    Json(state.usage.snapshot())
}
