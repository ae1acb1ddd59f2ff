//! Codex backend: the `OpenAI` Responses API behind a `ChatGPT` subscription.
//!
//! Auth: `Authorization: Bearer {oauth token}` plus the `chatgpt-account-id`
//! header taken from the token's account claim.

use crate::http_util::{ProviderHttp, endpoint, require_credential};
use async_trait::async_trait;
use relaygate_translate::{ResponsesDecoder, build_responses_body};
use relaygate_types::{
    Backend, BackendCall, EventStream, GatewayError, ModelBackend, ProviderId, Result,
};

pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api/codex";

/// Originator header expected by the Codex backend.
const ORIGINATOR: &str = "codex_cli_rs";

pub struct CodexBackend {
    ph: ProviderHttp,
    url: String,
}

impl CodexBackend {
    #[must_use]
    pub fn new(http: rquest::Client, base_url: Option<&str>) -> Self {
        Self {
            ph: ProviderHttp::new(http),
            url: endpoint(base_url.unwrap_or(DEFAULT_BASE_URL), "responses"),
        }
    }
}

#[async_trait]
impl ModelBackend for CodexBackend {
    fn backend(&self) -> Backend {
        Backend::OpenAICodex
    }

    async fn stream(&self, call: BackendCall) -> Result<EventStream> {
        let grant = require_credential(&call, ProviderId::OpenAICodex)?;
        let account_id = grant.account_id.as_deref().ok_or_else(|| {
            GatewayError::ClaimExtractionFailed {
                provider: ProviderId::OpenAICodex,
                claim: "chatgpt_account_id".to_string(),
            }
        })?;

        let body = build_responses_body(&call.model, &call.request);
        let builder = self
            .ph
            .client()
            .post(&self.url)
            .header("authorization", format!("Bearer {}", grant.access_token))
            .header("chatgpt-account-id", account_id)
            .header("originator", ORIGINATOR)
            .header("openai-beta", "responses=experimental")
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(&body);

        tracing::debug!(model = %call.model, "sending responses request");
        self.ph.send_events(builder, ResponsesDecoder::new()).await
    }
}
