//! Backend construction from a configuration snapshot.

use crate::anthropic::AnthropicBackend;
use crate::codex::CodexBackend;
use crate::openai_compat::OpenAICompatBackend;
use relaygate_config::Config;
use relaygate_types::{Backend, ModelBackend, ProtocolFormat};
use std::sync::Arc;

/// Maps a [`Backend`] to a ready-to-call [`ModelBackend`].
///
/// Called once per invocation so that key and base-URL changes in a reloaded
/// configuration take effect on the next request.
pub trait BackendResolver: Send + Sync {
    fn resolve(&self, backend: Backend, config: &Config) -> Arc<dyn ModelBackend>;
}

/// The production resolver: HTTP backends sharing one client.
#[derive(Clone)]
pub struct HttpBackends {
    http: rquest::Client,
}

impl HttpBackends {
    #[must_use]
    pub fn new(http: rquest::Client) -> Self {
        Self { http }
    }
}

impl BackendResolver for HttpBackends {
    fn resolve(&self, backend: Backend, config: &Config) -> Arc<dyn ModelBackend> {
        let http = self.http.clone();
        let section = &config.backends;
        let settings = section.get(backend);
        let base_url = settings.and_then(|c| c.base_url.as_deref());
        let api_key = settings.and_then(|c| c.api_key.clone());
        match backend.protocol() {
            ProtocolFormat::Anthropic if backend == Backend::ClaudeMax => Arc::new(
                AnthropicBackend::claude_max(http, section.claude_max_base_url.as_deref()),
            ),
            ProtocolFormat::Anthropic => {
                Arc::new(AnthropicBackend::direct(http, base_url, api_key))
            }
            ProtocolFormat::Responses => Arc::new(CodexBackend::new(
                http,
                section.openai_codex_base_url.as_deref(),
            )),
            ProtocolFormat::ChatCompletions => {
                Arc::new(OpenAICompatBackend::new(http, backend, base_url, api_key))
            }
        }
    }
}
