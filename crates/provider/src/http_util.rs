//! Shared HTTP utilities for backends.
//!
//! Every backend does the same thing after building its body: send, check the
//! status, and run the SSE body through a protocol decoder.

use bytes::Bytes;
use eventsource_stream::Eventsource as _;
use futures_util::{Stream, StreamExt as _, stream};
use relaygate_translate::UpstreamDecoder;
use relaygate_types::{
    AccessGrant, Backend, BackendCall, EventStream, GatewayError, ProviderId, Result, StreamEvent,
};
use rquest::{Client, RequestBuilder};
use std::collections::VecDeque;
use std::fmt::Display;

/// Shared HTTP helper that all backends use to send requests.
#[derive(Clone)]
pub struct ProviderHttp {
    http: Client,
}

impl ProviderHttp {
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    /// Returns a reference to the inner HTTP client for building requests.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.http
    }

    /// Sends a request and checks for success status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Upstream`] on non-2xx responses, or
    /// [`GatewayError::Http`] if the request fails to send.
    pub async fn send(&self, builder: RequestBuilder) -> Result<rquest::Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "upstream returned error status");
            Err(GatewayError::Upstream {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Sends a streaming request and decodes its SSE body.
    ///
    /// # Errors
    ///
    /// See [`ProviderHttp::send`].
    pub async fn send_events<D>(&self, builder: RequestBuilder, decoder: D) -> Result<EventStream>
    where
        D: UpstreamDecoder + 'static,
    {
        let resp = self.send(builder).await?;
        Ok(decode_sse(resp.bytes_stream(), decoder))
    }
}

/// The OAuth credential attached to `call`.
///
/// # Errors
///
/// Returns [`GatewayError::MissingCredential`] if the orchestrator supplied none.
pub fn require_credential(call: &BackendCall, provider: ProviderId) -> Result<&AccessGrant> {
    call.credential
        .as_ref()
        .ok_or_else(|| GatewayError::MissingCredential {
            provider,
            hint: format!("no access token was obtained for {provider}"),
        })
}

/// The configured API key of an API-key backend.
///
/// # Errors
///
/// Returns [`GatewayError::BackendUnavailable`] if none is configured.
pub fn require_api_key(backend: Backend, key: Option<&str>) -> Result<&str> {
    key.filter(|k| !k.is_empty()).ok_or_else(|| {
        GatewayError::BackendUnavailable(format!("no API key configured for {backend}"))
    })
}

/// Join a base URL and a path without doubling the slash.
#[must_use]
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Run a raw SSE byte stream through `decoder`.
///
/// Transport errors become a final [`StreamEvent::Error`]. The upstream body is
/// dropped as soon as the decoder reports an error.
pub fn decode_sse<S, E, D>(bytes: S, decoder: D) -> EventStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
    D: UpstreamDecoder + 'static,
{
    struct State<T, D> {
        sse: Option<T>,
        decoder: D,
        queue: VecDeque<StreamEvent>,
    }

    let state = State {
        sse: Some(Box::pin(bytes.eventsource())),
        decoder,
        queue: VecDeque::new(),
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(ev) = st.queue.pop_front() {
                return Some((ev, st));
            }
            let sse = st.sse.as_mut()?;
            match sse.next().await {
                Some(Ok(ev)) => {
                    let events = st.decoder.on_event(&ev.event, &ev.data);
                    if events.iter().any(|e| matches!(e, StreamEvent::Error { .. })) {
                        st.sse = None;
                    }
                    st.queue.extend(events);
                }
                Some(Err(e)) => {
                    st.sse = None;
                    st.queue
                        .push_back(StreamEvent::error(format!("upstream stream error: {e}")));
                }
                None => {
                    st.sse = None;
                    st.queue.extend(st.decoder.finish());
                }
            }
        }
    }))
}
