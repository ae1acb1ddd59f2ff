//! Anthropic Messages API backend.
//!
//! Serves both the Claude Max consumer plan (OAuth Bearer token plus the
//! Claude CLI beta headers) and the direct API (`x-api-key`).

use crate::http_util::{ProviderHttp, endpoint, require_api_key, require_credential};
use async_trait::async_trait;
use relaygate_translate::{AnthropicDecoder, build_messages_body};
use relaygate_types::{Backend, BackendCall, EventStream, ModelBackend, ProviderId, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Required Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Beta features for OAuth tokens; `oauth-2025-04-20` is required for Bearer auth.
const OAUTH_BETA: &str = "claude-code-20250219,oauth-2025-04-20,interleaved-thinking-2025-05-14,fine-grained-tool-streaming-2025-05-14";

/// Beta features for direct API keys.
const API_KEY_BETA: &str = "interleaved-thinking-2025-05-14,fine-grained-tool-streaming-2025-05-14";

/// User-Agent matching the Claude CLI.
const USER_AGENT: &str = "claude-cli/2.1.44 (external, sdk-cli)";

enum Auth {
    /// Claude Max: token arrives with each call.
    OAuth,
    ApiKey(Option<String>),
}

pub struct AnthropicBackend {
    ph: ProviderHttp,
    url: String,
    auth: Auth,
}

impl AnthropicBackend {
    /// Claude Max through OAuth.
    #[must_use]
    pub fn claude_max(http: rquest::Client, base_url: Option<&str>) -> Self {
        Self {
            ph: ProviderHttp::new(http),
            url: endpoint(base_url.unwrap_or(DEFAULT_BASE_URL), "messages?beta=true"),
            auth: Auth::OAuth,
        }
    }

    /// The Anthropic API with a static key.
    #[must_use]
    pub fn direct(http: rquest::Client, base_url: Option<&str>, api_key: Option<String>) -> Self {
        Self {
            ph: ProviderHttp::new(http),
            url: endpoint(base_url.unwrap_or(DEFAULT_BASE_URL), "messages"),
            auth: Auth::ApiKey(api_key),
        }
    }
}

#[async_trait]
impl ModelBackend for AnthropicBackend {
    fn backend(&self) -> Backend {
        match self.auth {
            Auth::OAuth => Backend::ClaudeMax,
            Auth::ApiKey(_) => Backend::Anthropic,
        }
    }

    async fn stream(&self, call: BackendCall) -> Result<EventStream> {
        let body = build_messages_body(&call.model, &call.request, true);

        let builder = self
            .ph
            .client()
            .post(&self.url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream");

        let builder = match &self.auth {
            Auth::OAuth => {
                let grant = require_credential(&call, ProviderId::ClaudeMax)?;
                builder
                    .header("anthropic-beta", OAUTH_BETA)
                    .header("anthropic-dangerous-direct-browser-access", "true")
                    .header("x-app", "cli")
                    .header("user-agent", USER_AGENT)
                    .header("authorization", format!("Bearer {}", grant.access_token))
            }
            Auth::ApiKey(key) => {
                let key = require_api_key(Backend::Anthropic, key.as_deref())?;
                builder
                    .header("anthropic-beta", API_KEY_BETA)
                    .header("x-api-key", key)
            }
        };

        tracing::debug!(backend = %self.backend(), model = %call.model, "sending messages request");
        self.ph
            .send_events(builder.json(&body), AnthropicDecoder::new())
            .await
    }
}
