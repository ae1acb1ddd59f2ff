//! Access-token lifecycle for the OAuth-gated providers.
//!
//! Responsibilities:
//! - Serve cached tokens from the [`CredentialStore`] while they are outside
//!   the expiry buffer.
//! - Refresh through the [`TokenEndpoint`], with at most one refresh in flight
//!   per provider. Concurrent callers await the same shared future and see the
//!   same outcome.
//! - Persist rotated refresh tokens and the new access token, best-effort.
use crate::jwt;
use crate::profile::{CacheField, OAuthProfile, profile};
use arc_swap::ArcSwap;
use futures_util::future::{BoxFuture, FutureExt as _, Shared, WeakShared};
use relaygate_config::Config;
use relaygate_types::{
    AccessGrant, CredentialStore, EXPIRY_BUFFER, GatewayError, ProviderId, RefreshRequest, Result,
    TokenEndpoint, TokenGrant, token::now_millis,
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

type RefreshFuture = BoxFuture<'static, Result<AccessGrant>>;

struct Inner {
    store: Arc<dyn CredentialStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    /// Read on every refresh so that a reloaded `oauth` section applies to the
    /// next refresh.
    config: Arc<ArcSwap<Config>>,
    /// Refreshes currently running. Weak handles, so an abandoned refresh is
    /// dropped together with its last waiter.
    inflight: Mutex<HashMap<ProviderId, WeakShared<RefreshFuture>>>,
}

/// Hands out access tokens for [`ProviderId`]s, refreshing them as needed.
#[derive(Clone)]
pub struct OAuthTokenManager {
    inner: Arc<Inner>,
    buffer: Duration,
}

impl OAuthTokenManager {
    /// Creates a manager. Client-id overrides and static refresh tokens are
    /// taken from the `oauth` section of the current `config` snapshot.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        config: Arc<ArcSwap<Config>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                endpoint,
                config,
                inflight: Mutex::new(HashMap::new()),
            }),
            buffer: EXPIRY_BUFFER,
        }
    }

    /// Override the expiry buffer.
    #[must_use]
    pub fn with_buffer(mut self, buffer: Duration) -> Self {
        self.buffer = buffer;
        self
    }

    /// Return a usable access token for `provider`, refreshing if needed.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::MissingCredential`] if no refresh token is available.
    /// - [`GatewayError::RefreshFailed`] if the token endpoint rejects the grant.
    /// - [`GatewayError::ClaimExtractionFailed`] if the new token lacks a
    ///   required account claim.
    pub async fn access_token(&self, provider: ProviderId) -> Result<AccessGrant> {
        if let Some(grant) = self.inner.cached(provider, self.buffer).await {
            tracing::debug!(provider = %provider, "using cached access token");
            return Ok(grant);
        }
        self.refresh_shared(provider).await
    }

    /// Number of refreshes currently in flight.
    #[must_use]
    pub fn pending_refreshes(&self) -> usize {
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|w| w.upgrade().is_some())
            .count()
    }

    /// Join the running refresh for `provider`, or start one.
    fn refresh_shared(&self, provider: ProviderId) -> Shared<RefreshFuture> {
        let mut inflight = self
            .inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = inflight.get(&provider).and_then(WeakShared::upgrade) {
            tracing::debug!(provider = %provider, "joining in-flight refresh");
            return running;
        }

        let inner = Arc::clone(&self.inner);
        let fut = async move {
            let result = inner.refresh(provider).await;
            inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&provider);
            result
        }
        .boxed()
        .shared();
        if let Some(weak) = fut.downgrade() {
            inflight.insert(provider, weak);
        }
        fut
    }
}

impl Inner {
    async fn cache_get(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "credential cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Err(e) = self.store.set(key, value, ttl).await {
            tracing::warn!(key, error = %e, "credential cache write failed");
        }
    }

    /// A cached token that is still outside the expiry buffer, with its
    /// account claim when the provider requires one.
    async fn cached(&self, provider: ProviderId, buffer: Duration) -> Option<AccessGrant> {
        let profile = profile(provider);
        let access_token = self
            .cache_get(&profile.cache_key(CacheField::AccessToken))
            .await?;
        let expires_at_ms = self
            .cache_get(&profile.cache_key(CacheField::AccessTokenExpiry))
            .await?
            .parse::<u64>()
            .ok()?;
        let mut grant = AccessGrant {
            access_token,
            account_id: None,
            expires_at_ms,
        };
        if !grant.is_usable_at(now_millis(), buffer) {
            return None;
        }
        if let Some(path) = profile.claim {
            let account_id = match jwt::extract_claim(&grant.access_token, path) {
                Some(id) => id,
                None => {
                    self.cache_get(&profile.cache_key(CacheField::AccountId))
                        .await?
                }
            };
            grant.account_id = Some(account_id);
        }
        Some(grant)
    }

    async fn refresh_token(&self, profile: &OAuthProfile) -> Result<String> {
        if let Some(token) = self
            .cache_get(&profile.cache_key(CacheField::RefreshToken))
            .await
            .filter(|t| !t.is_empty())
        {
            return Ok(token);
        }
        self.config
            .load()
            .oauth
            .get(profile.provider)
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::MissingCredential {
                provider: profile.provider,
                hint: profile.missing_hint(),
            })
    }

    async fn refresh(&self, provider: ProviderId) -> Result<AccessGrant> {
        let profile = profile(provider);
        let refresh_token = self.refresh_token(profile).await?;
        let client_id = self
            .config
            .load()
            .oauth
            .get(provider)
            .client_id
            .clone()
            .unwrap_or_else(|| profile.client_id.to_string());

        tracing::info!(provider = %provider, "refreshing access token");
        let request = RefreshRequest {
            provider,
            token_url: profile.token_url.to_string(),
            client_id,
            refresh_token,
        };
        let grant = self.endpoint.refresh(&request).await.inspect_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "token refresh failed");
        })?;

        let account_id = match profile.claim {
            Some(path) => Some(jwt::extract_claim(&grant.access_token, path).ok_or_else(|| {
                GatewayError::ClaimExtractionFailed {
                    provider,
                    claim: path.field.to_string(),
                }
            })?),
            None => None,
        };

        let access = AccessGrant {
            access_token: grant.access_token.clone(),
            account_id,
            expires_at_ms: grant.expires_at_ms(now_millis()),
        };
        self.write_back(profile, &grant, &access).await;
        tracing::info!(
            provider = %provider,
            expires_in = grant.expires_in,
            rotated = grant.refresh_token.is_some(),
            "access token refreshed"
        );
        Ok(access)
    }

    async fn write_back(&self, profile: &OAuthProfile, grant: &TokenGrant, access: &AccessGrant) {
        let ttl = Some(grant.cache_ttl());
        self.cache_set(
            &profile.cache_key(CacheField::AccessToken),
            &access.access_token,
            ttl,
        )
        .await;
        self.cache_set(
            &profile.cache_key(CacheField::AccessTokenExpiry),
            &access.expires_at_ms.to_string(),
            ttl,
        )
        .await;
        if let Some(account_id) = &access.account_id {
            self.cache_set(&profile.cache_key(CacheField::AccountId), account_id, ttl)
                .await;
        }
        if let Some(rotated) = &grant.refresh_token {
            self.cache_set(&profile.cache_key(CacheField::RefreshToken), rotated, None)
                .await;
        }
    }
}
