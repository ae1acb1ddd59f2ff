//! Unified error type for the relaygate workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across relaygate crates.
///
/// The type is `Clone` so that one refresh outcome can be handed to every
/// caller waiting on the same in-flight refresh.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No refresh token exists in the cache or in the static fallback source.
    #[error("no refresh token available for {provider}. {hint}")]
    MissingCredential {
        provider: crate::ProviderId,
        hint: String,
    },

    /// The OAuth token endpoint rejected the refresh grant.
    #[error("token refresh failed for {provider}: status={status}, body={body}")]
    RefreshFailed {
        provider: crate::ProviderId,
        status: u16,
        body: String,
    },

    /// The access token lacks the account-scoped claim the backend requires.
    #[error("failed to extract `{claim}` from the {provider} access token")]
    ClaimExtractionFailed {
        provider: crate::ProviderId,
        claim: String,
    },

    /// The credential cache could not be reached. Callers treat this as a miss.
    #[error("credential cache unavailable: {0}")]
    CacheUnavailable(String),

    /// The inbound request is malformed or asks for something unsupported.
    #[error("{message}")]
    InvalidRequest {
        message: String,
        code: Option<&'static str>,
    },

    /// The upstream backend returned a non-success status.
    #[error("upstream error: status={status}, body={body}")]
    Upstream { status: u16, body: String },

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// Request or response format translation failure.
    #[error("translation error: {0}")]
    Translation(String),

    /// The backend reported an error inside its event stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend for a model is not configured (for example, a missing API key).
    #[error("backend not available: {0}")]
    BackendUnavailable(String),

    /// Both the primary backend and the fallback backend failed.
    #[error("primary backend failed ({primary}); fallback failed ({fallback})")]
    FallbackFailed { primary: String, fallback: String },
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "rquest")]
impl From<rquest::Error> for GatewayError {
    fn from(e: rquest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl GatewayError {
    /// Shorthand for an [`GatewayError::InvalidRequest`] without an error code.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            code: None,
        }
    }

    /// Returns `true` if the error came from acquiring an OAuth credential.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. }
                | Self::RefreshFailed { .. }
                | Self::ClaimExtractionFailed { .. }
        )
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, GatewayError>;
