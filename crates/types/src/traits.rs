//! Async traits shared across all relaygate crates.
//!
//! Every cross-crate abstraction is defined here so that higher layers depend
//! only on `relaygate-types`, not on each other.

use crate::{
    AccessGrant, Backend, Generation, GenerationRequest, ProviderId, Result, StreamEvent,
    TokenGrant,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;
use std::pin::Pin;
use std::time::Duration;

/// A pinned, sendable stream of raw byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A pinned, sendable stream of unified backend events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Key/value cache in front of the OAuth token endpoints.
///
/// Purely an optimization: every failure is reported as
/// [`GatewayError::CacheUnavailable`](crate::GatewayError::CacheUnavailable)
/// and callers treat it as a miss.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read a value. Expired entries read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Write a value, optionally expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
    /// Remove a value. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// A refresh-token grant to send to a provider's token endpoint.
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub provider: ProviderId,
    pub token_url: String,
    pub client_id: String,
    pub refresh_token: String,
}

/// Performs the network half of a token refresh.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RefreshFailed`](crate::GatewayError::RefreshFailed)
    /// for non-2xx responses or bodies lacking `access_token`/`expires_in`.
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenGrant>;
}

/// Everything one backend invocation needs.
#[derive(Debug, Clone)]
pub struct BackendCall {
    /// Upstream model name.
    pub model: String,
    pub request: GenerationRequest,
    /// OAuth credential for backends that need one.
    pub credential: Option<AccessGrant>,
}

/// An upstream model-serving target.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// Start a streaming generation.
    ///
    /// Errors returned here (transport failures, non-2xx status) happen before
    /// any event is produced. Failures after that arrive as
    /// [`StreamEvent::Error`].
    async fn stream(&self, call: BackendCall) -> Result<EventStream>;

    /// Run a generation to completion.
    async fn generate(&self, call: BackendCall) -> Result<Generation> {
        let events = self.stream(call).await?;
        Generation::collect(events).await
    }
}
