//! Per-request orchestration: route, budget, authenticate, invoke, fall back.

use crate::backends::BackendResolver;
use crate::budget::{Budget, fallback_budget, resolve_budget};
use crate::router::ModelRouter;
use bytes::Bytes;
use futures_util::{Stream, StreamExt as _, future, stream};
use relaygate_auth::OAuthTokenManager;
use relaygate_config::Config;
use relaygate_translate::{
    ChatCompletion, CompletionMeta, build_completion, convert_request, sse_stream,
};
use relaygate_types::{
    AuthStrategy, Backend, BackendCall, ChatCompletionRequest, EventStream, GatewayError,
    GenerationRequest, ModelDescriptor, Result, StreamEvent,
};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

/// OpenAI SSE frames, ending with `data: [DONE]`.
pub type SseStream = Pin<Box<dyn Stream<Item = Bytes> + Send>>;

/// Which backend produced the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServedBy {
    Primary,
    Fallback,
}

impl ServedBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ServedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub enum Reply {
    Completion(ChatCompletion),
    Stream(SseStream),
}

/// Result of [`Gateway::handle`].
pub struct GatewayResponse {
    pub reply: Reply,
    pub served_by: ServedBy,
    /// Public model name reported to the client.
    pub model: String,
    pub backend: Backend,
}

/// Ties routing, budgets, credentials and backends together.
#[derive(Clone)]
pub struct Gateway {
    auth: Arc<OAuthTokenManager>,
    backends: Arc<dyn BackendResolver>,
}

impl Gateway {
    #[must_use]
    pub fn new(auth: Arc<OAuthTokenManager>, backends: Arc<dyn BackendResolver>) -> Self {
        Self { auth, backends }
    }

    /// Serve one chat-completion request against a configuration snapshot.
    ///
    /// Any failure of the primary invocation, including credential
    /// acquisition, is retried exactly once on the fallback backend with a
    /// reduced cap and reasoning disabled.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for a malformed request. No backend
    ///   is called.
    /// - [`GatewayError::FallbackFailed`] if both the primary and the fallback
    ///   invocation fail.
    /// - The fallback's own error when the request named the fallback directly.
    pub async fn handle(
        &self,
        config: &Config,
        req: &ChatCompletionRequest,
    ) -> Result<GatewayResponse> {
        let request = convert_request(req)?;
        let router = ModelRouter::new(config);
        let resolution = router.resolve(req.model.as_deref());
        let descriptor = router.describe(&resolution);
        let caller_max = req.caller_max_tokens();
        let stream = req.is_stream();

        if resolution.use_fallback {
            let budget = fallback_budget(caller_max, &config.budgets);
            return self
                .invoke(config, &descriptor, request, budget, stream)
                .await
                .map(|reply| respond(reply, ServedBy::Fallback, &descriptor));
        }

        let budget = resolve_budget(
            &descriptor,
            req.reasoning_budget,
            caller_max,
            &config.budgets,
        );
        tracing::debug!(
            model = %descriptor.public_id,
            backend = %descriptor.backend,
            max_output_tokens = budget.max_output_tokens,
            reasoning_budget = ?budget.reasoning_budget,
            "invoking primary backend"
        );

        let primary_err = match self
            .invoke(config, &descriptor, request.clone(), budget, stream)
            .await
        {
            Ok(reply) => return Ok(respond(reply, ServedBy::Primary, &descriptor)),
            Err(e) => e,
        };

        let fallback = router.fallback_descriptor();
        tracing::warn!(
            model = %descriptor.public_id,
            backend = %descriptor.backend,
            fallback = %fallback.backend,
            error = %primary_err,
            "primary backend failed, retrying on fallback"
        );
        let budget = fallback_budget(caller_max, &config.budgets);
        match self
            .invoke(config, &fallback, request, budget, stream)
            .await
        {
            Ok(reply) => Ok(respond(reply, ServedBy::Fallback, &fallback)),
            Err(fallback_err) => {
                tracing::error!(error = %fallback_err, "fallback backend failed");
                Err(GatewayError::FallbackFailed {
                    primary: primary_err.to_string(),
                    fallback: fallback_err.to_string(),
                })
            }
        }
    }

    async fn invoke(
        &self,
        config: &Config,
        descriptor: &ModelDescriptor,
        mut request: GenerationRequest,
        budget: Budget,
        stream: bool,
    ) -> Result<Reply> {
        let credential = match descriptor.auth() {
            AuthStrategy::OAuth(provider) => Some(self.auth.access_token(provider).await?),
            AuthStrategy::ApiKey => None,
        };
        request.max_output_tokens = Some(budget.max_output_tokens);
        request.reasoning_budget = budget.reasoning_budget;

        let backend = self.backends.resolve(descriptor.backend, config);
        let call = BackendCall {
            model: descriptor.upstream_model.clone(),
            request,
            credential,
        };
        let meta = CompletionMeta::new(descriptor.public_id.clone());

        if stream {
            let events = open_stream(backend.stream(call).await?).await?;
            Ok(Reply::Stream(Box::pin(sse_stream(events, meta))))
        } else {
            let generation = backend.generate(call).await?;
            Ok(Reply::Completion(build_completion(&meta, generation)))
        }
    }
}

fn respond(reply: Reply, served_by: ServedBy, descriptor: &ModelDescriptor) -> GatewayResponse {
    GatewayResponse {
        reply,
        served_by,
        model: descriptor.public_id.clone(),
        backend: descriptor.backend,
    }
}

/// Wait for the first event so that a backend failing before any output
/// counts as an invocation error. Later errors stay in the stream.
async fn open_stream(mut events: EventStream) -> Result<EventStream> {
    match events.next().await {
        Some(StreamEvent::Error { message }) => Err(GatewayError::Stream(message)),
        Some(first) => Ok(Box::pin(stream::once(future::ready(first)).chain(events))),
        None => Ok(Box::pin(stream::empty())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arc_swap::ArcSwap;
    use async_trait::async_trait;
    use futures_util::StreamExt as _;
    use relaygate_store::InMemoryCredentialStore;
    use relaygate_translate::FinishReason;
    use relaygate_types::{
        BackendFinish, CredentialStore, ModelBackend, RefreshRequest, TokenEndpoint, TokenGrant,
        Usage, token::now_millis,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Script {
        Fail(&'static str),
        Events(Vec<StreamEvent>),
    }

    struct Scripted {
        backend: Backend,
        script: Script,
        calls: Mutex<Vec<BackendCall>>,
    }

    impl Scripted {
        fn new(backend: Backend, script: Script) -> Arc<Self> {
            Arc::new(Self {
                backend,
                script,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<BackendCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelBackend for Scripted {
        fn backend(&self) -> Backend {
            self.backend
        }

        async fn stream(&self, call: BackendCall) -> Result<EventStream> {
            self.calls.lock().unwrap().push(call);
            match &self.script {
                Script::Fail(msg) => Err(GatewayError::Upstream {
                    status: 503,
                    body: (*msg).to_string(),
                }),
                Script::Events(events) => Ok(Box::pin(stream::iter(events.clone()))),
            }
        }
    }

    struct Resolver(HashMap<Backend, Arc<Scripted>>);

    impl BackendResolver for Resolver {
        fn resolve(&self, backend: Backend, _config: &Config) -> Arc<dyn ModelBackend> {
            self.0[&backend].clone()
        }
    }

    struct NoEndpoint;

    #[async_trait]
    impl TokenEndpoint for NoEndpoint {
        async fn refresh(&self, request: &RefreshRequest) -> Result<TokenGrant> {
            Err(GatewayError::RefreshFailed {
                provider: request.provider,
                status: 400,
                body: "invalid_grant".into(),
            })
        }
    }

    fn answer(text: &str) -> Script {
        Script::Events(vec![
            StreamEvent::text(text),
            StreamEvent::Finish {
                reason: BackendFinish::EndTurn,
                usage: Some(Usage {
                    input_tokens: 5,
                    output_tokens: 1,
                }),
            },
        ])
    }

    async fn auth(seed_token: bool) -> Arc<OAuthTokenManager> {
        let store = Arc::new(InMemoryCredentialStore::new());
        if seed_token {
            store
                .set("claude-max:access_token", "at-cached", None)
                .await
                .unwrap();
            store
                .set(
                    "claude-max:access_token_expiry",
                    &(now_millis() + 3_600_000).to_string(),
                    None,
                )
                .await
                .unwrap();
        }
        Arc::new(OAuthTokenManager::new(
            store,
            Arc::new(NoEndpoint),
            Arc::new(ArcSwap::from_pointee(Config::default())),
        ))
    }

    async fn gateway(
        primary: &Arc<Scripted>,
        fallback: &Arc<Scripted>,
        seed_token: bool,
    ) -> Gateway {
        let mut map = HashMap::new();
        map.insert(primary.backend, Arc::clone(primary));
        map.insert(fallback.backend, Arc::clone(fallback));
        Gateway::new(auth(seed_token).await, Arc::new(Resolver(map)))
    }

    fn request(body: serde_json::Value) -> ChatCompletionRequest {
        serde_json::from_value(body).unwrap()
    }

    fn completion(resp: GatewayResponse) -> ChatCompletion {
        match resp.reply {
            Reply::Completion(c) => c,
            Reply::Stream(_) => panic!("expected a completion"),
        }
    }

    async fn sse_text(resp: GatewayResponse) -> String {
        match resp.reply {
            Reply::Stream(s) => {
                let frames: Vec<Bytes> = s.collect().await;
                frames
                    .iter()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .collect()
            }
            Reply::Completion(_) => panic!("expected a stream"),
        }
    }

    #[tokio::test]
    async fn test_healthy_primary_end_to_end() {
        let primary = Scripted::new(Backend::ClaudeMax, answer("4"));
        let fallback = Scripted::new(Backend::Groq, answer("unused"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"messages":[{"role":"user","content":"2+2?"}], "stream": false})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Primary);
        assert_eq!(resp.model, "claude-opus-4-6");
        let c = completion(resp);
        assert_eq!(c.object, "chat.completion");
        assert_eq!(c.choices[0].message.role, "assistant");
        assert_eq!(c.choices[0].message.content.as_deref(), Some("4"));
        assert_eq!(c.choices[0].finish_reason, FinishReason::Stop);
        assert_eq!(c.usage.unwrap().total_tokens, 6);

        let calls = primary.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "claude-opus-4-6");
        assert_eq!(calls[0].credential.as_ref().unwrap().access_token, "at-cached");
        assert_eq!(calls[0].request.max_output_tokens, Some(128_000));
        assert_eq!(calls[0].request.reasoning_budget, Some(127_000));
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_once_with_capped_budget() {
        let primary = Scripted::new(Backend::ClaudeMax, Script::Fail("overloaded"));
        let fallback = Scripted::new(Backend::Groq, answer("4"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({
                    "model": "claude-opus",
                    "max_tokens": 200_000,
                    "messages": [{"role":"user","content":"2+2?"}]
                })),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Fallback);
        assert_eq!(resp.backend, Backend::Groq);
        assert_eq!(completion(resp).model, "groq-fallback");

        assert_eq!(primary.calls().len(), 1);
        let calls = fallback.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "openai/gpt-oss-120b");
        assert_eq!(calls[0].request.max_output_tokens, Some(65_536));
        assert_eq!(calls[0].request.reasoning_budget, None);
        assert!(calls[0].credential.is_none());
    }

    #[tokio::test]
    async fn test_both_failing_is_fallback_failed() {
        let primary = Scripted::new(Backend::ClaudeMax, Script::Fail("down"));
        let fallback = Scripted::new(Backend::Groq, Script::Fail("also down"));
        let gw = gateway(&primary, &fallback, true).await;

        let err = gw
            .handle(
                &Config::default(),
                &request(json!({"messages":[{"role":"user","content":"hi"}]})),
            )
            .await
            .err()
            .unwrap();
        match err {
            GatewayError::FallbackFailed { primary, fallback } => {
                assert!(primary.contains("down"));
                assert!(fallback.contains("also down"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fallback.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_falls_back() {
        let primary = Scripted::new(Backend::ClaudeMax, answer("never"));
        let fallback = Scripted::new(Backend::Groq, answer("4"));
        let gw = gateway(&primary, &fallback, false).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"messages":[{"role":"user","content":"hi"}]})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Fallback);
        assert!(primary.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_a_backend() {
        let primary = Scripted::new(Backend::ClaudeMax, answer("x"));
        let fallback = Scripted::new(Backend::Groq, answer("x"));
        let gw = gateway(&primary, &fallback, true).await;

        for body in [
            json!({"messages": []}),
            json!({"model": "claude-opus"}),
            json!({"n": 2, "messages":[{"role":"user","content":"hi"}]}),
        ] {
            let err = gw
                .handle(&Config::default(), &request(body))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, GatewayError::InvalidRequest { .. }));
        }
        assert!(primary.calls().is_empty());
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sentinel_goes_straight_to_fallback() {
        let primary = Scripted::new(Backend::ClaudeMax, answer("x"));
        let fallback = Scripted::new(Backend::Groq, answer("4"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"model":"groq-fallback","messages":[{"role":"user","content":"hi"}]})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Fallback);
        assert_eq!(resp.model, "groq-fallback");
        assert!(primary.calls().is_empty());
        assert_eq!(fallback.calls()[0].request.max_output_tokens, Some(16_000));
    }

    #[tokio::test]
    async fn test_streaming_primary() {
        let primary = Scripted::new(Backend::ClaudeMax, answer("4"));
        let fallback = Scripted::new(Backend::Groq, answer("x"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"stream": true, "messages":[{"role":"user","content":"2+2?"}]})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Primary);
        let text = sse_text(resp).await;
        assert!(text.contains(r#""role":"assistant""#));
        assert!(text.contains(r#""content":"4""#));
        assert!(text.contains(r#""finish_reason":"stop""#));
        assert!(text.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_stream_error_before_output_falls_back() {
        let primary = Scripted::new(
            Backend::ClaudeMax,
            Script::Events(vec![StreamEvent::error("overloaded_error")]),
        );
        let fallback = Scripted::new(Backend::Groq, answer("4"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"stream": true, "messages":[{"role":"user","content":"hi"}]})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Fallback);
        let text = sse_text(resp).await;
        assert!(text.contains(r#""model":"groq-fallback""#));
        assert!(text.ends_with("data: [DONE]\n\n"));
    }

    #[tokio::test]
    async fn test_stream_error_after_output_stays_in_stream() {
        let primary = Scripted::new(
            Backend::ClaudeMax,
            Script::Events(vec![StreamEvent::text("par"), StreamEvent::error("reset")]),
        );
        let fallback = Scripted::new(Backend::Groq, answer("x"));
        let gw = gateway(&primary, &fallback, true).await;

        let resp = gw
            .handle(
                &Config::default(),
                &request(json!({"stream": true, "messages":[{"role":"user","content":"hi"}]})),
            )
            .await
            .unwrap();
        assert_eq!(resp.served_by, ServedBy::Primary);
        let text = sse_text(resp).await;
        assert!(text.contains(r#""error""#));
        assert!(text.ends_with("data: [DONE]\n\n"));
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test]
    async fn test_suffix_budget_reaches_backend() {
        let primary = Scripted::new(Backend::Anthropic, answer("ok"));
        let fallback = Scripted::new(Backend::Groq, answer("x"));
        let gw = gateway(&primary, &fallback, false).await;

        gw.handle(
            &Config::default(),
            &request(json!({
                "model": "anthropic-direct/claude-sonnet-4-5-think-low",
                "messages":[{"role":"user","content":"hi"}]
            })),
        )
        .await
        .unwrap();
        let calls = primary.calls();
        assert_eq!(calls[0].model, "claude-sonnet-4-5");
        assert_eq!(calls[0].request.reasoning_budget, Some(10_000));
        assert_eq!(calls[0].request.max_output_tokens, Some(26_000));
        assert!(calls[0].credential.is_none());
    }
}
