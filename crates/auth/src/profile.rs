//! Static per-provider OAuth settings.

use relaygate_types::ProviderId;

/// Location of an account-scoped claim inside a JWT payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPath {
    /// Top-level payload key holding a nested object.
    pub namespace: &'static str,
    /// Key inside that object.
    pub field: &'static str,
}

/// Everything needed to refresh a provider's access token.
#[derive(Debug, Clone, Copy)]
pub struct OAuthProfile {
    pub provider: ProviderId,
    pub token_url: &'static str,
    /// Built-in client id, overridable through configuration.
    pub client_id: &'static str,
    /// Environment variable consulted for a static refresh token.
    pub refresh_token_env: &'static str,
    /// Key of this provider under the `oauth` configuration section.
    pub config_section: &'static str,
    /// Claim that must be present in every access token.
    pub claim: Option<ClaimPath>,
}

impl OAuthProfile {
    /// Remediation hint attached to `MissingCredential`.
    #[must_use]
    pub fn missing_hint(&self) -> String {
        format!(
            "Set {} or oauth.{}.refresh_token in the config file.",
            self.refresh_token_env, self.config_section
        )
    }

    /// Cache key for one of this provider's credential fields.
    #[must_use]
    pub fn cache_key(&self, field: CacheField) -> String {
        format!("{}:{}", self.provider, field.suffix())
    }
}

/// Credential fields kept in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheField {
    AccessToken,
    /// Unix milliseconds.
    AccessTokenExpiry,
    RefreshToken,
    AccountId,
}

impl CacheField {
    fn suffix(self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::AccessTokenExpiry => "access_token_expiry",
            Self::RefreshToken => "refresh_token",
            Self::AccountId => "account_id",
        }
    }
}

/// The OAuth profile for a provider.
#[must_use]
pub fn profile(provider: ProviderId) -> &'static OAuthProfile {
    match provider {
        ProviderId::ClaudeMax => &crate::claude::PROFILE,
        ProviderId::OpenAICodex => &crate::codex::PROFILE,
    }
}
