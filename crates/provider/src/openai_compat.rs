//! OpenAI-compatible Chat Completions backends: the multi-vendor gateway and
//! every direct vendor that speaks this protocol.
//!
//! Auth: `Authorization: Bearer {api key}`.

use crate::http_util::{ProviderHttp, endpoint, require_api_key};
use async_trait::async_trait;
use relaygate_translate::{ChatDecoder, build_chat_body};
use relaygate_types::{Backend, BackendCall, EventStream, ModelBackend, Result};

/// Default base URL per backend.
#[must_use]
pub fn default_base_url(backend: Backend) -> &'static str {
    match backend {
        Backend::Gateway => "https://ai-gateway.vercel.sh/v1",
        Backend::Xai => "https://api.x.ai/v1",
        Backend::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        Backend::Groq => "https://api.groq.com/openai/v1",
        Backend::Venice => "https://api.venice.ai/api/v1",
        Backend::OpenAI | Backend::OpenAICodex | Backend::ClaudeMax | Backend::Anthropic => {
            "https://api.openai.com/v1"
        }
    }
}

pub struct OpenAICompatBackend {
    ph: ProviderHttp,
    backend: Backend,
    url: String,
    api_key: Option<String>,
}

impl OpenAICompatBackend {
    #[must_use]
    pub fn new(
        http: rquest::Client,
        backend: Backend,
        base_url: Option<&str>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            ph: ProviderHttp::new(http),
            backend,
            url: endpoint(
                base_url.unwrap_or_else(|| default_base_url(backend)),
                "chat/completions",
            ),
            api_key,
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAICompatBackend {
    fn backend(&self) -> Backend {
        self.backend
    }

    async fn stream(&self, call: BackendCall) -> Result<EventStream> {
        let key = require_api_key(self.backend, self.api_key.as_deref())?;
        let body = build_chat_body(&call.model, &call.request);
        let builder = self
            .ph
            .client()
            .post(&self.url)
            .header("authorization", format!("Bearer {key}"))
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(&body);

        tracing::debug!(backend = %self.backend, model = %call.model, "sending chat request");
        self.ph.send_events(builder, ChatDecoder::new()).await
    }
}
