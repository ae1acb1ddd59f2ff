//! OAuth provider identifiers and upstream backend definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an OAuth-gated consumer-plan provider whose access tokens the
/// gateway refreshes on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderId {
    /// Claude Max subscription (Anthropic Messages API with OAuth bearer tokens).
    ClaudeMax,
    /// `ChatGPT` subscription via the Codex Responses backend.
    #[serde(rename = "openai-codex")]
    OpenAICodex,
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClaudeMax => write!(f, "claude-max"),
            Self::OpenAICodex => write!(f, "openai-codex"),
        }
    }
}

impl std::str::FromStr for ProviderId {
    type Err = crate::GatewayError;

    /// Parse a provider name or well-known alias into a [`ProviderId`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`](crate::GatewayError::Config) if the
    /// string does not name a known provider.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude-max" | "claude" | "anthropic" => Ok(Self::ClaudeMax),
            "openai-codex" | "codex" | "chatgpt" => Ok(Self::OpenAICodex),
            other => Err(crate::GatewayError::Config(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

impl ProviderId {
    /// Returns all known provider variants.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::ClaudeMax, Self::OpenAICodex]
    }
}

/// Broad category of an upstream backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A vendor API reached directly with a static API key.
    DirectVendor,
    /// A consumer-plan proxy that needs a refreshed OAuth access token.
    OAuthProxy,
    /// A multi-vendor gateway addressed with `vendor/model` ids.
    MultiVendorGateway,
}

/// Wire protocol spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFormat {
    /// Anthropic Messages API.
    Anthropic,
    /// `OpenAI` Responses API as served by the Codex backend.
    Responses,
    /// `OpenAI` Chat Completions API (and compatible vendors).
    ChatCompletions,
}

/// A concrete upstream target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    ClaudeMax,
    #[serde(rename = "openai_codex")]
    OpenAICodex,
    Gateway,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
    Xai,
    Google,
    Groq,
    Venice,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClaudeMax => "claude-max",
            Self::OpenAICodex => "openai-codex",
            Self::Gateway => "gateway",
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::Xai => "xai",
            Self::Google => "google",
            Self::Groq => "groq",
            Self::Venice => "venice",
        };
        f.write_str(s)
    }
}

/// How the gateway authenticates to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// A refreshed OAuth access token from the token manager.
    OAuth(ProviderId),
    /// A static API key from configuration.
    ApiKey,
}

impl Backend {
    /// Returns the backend category.
    #[must_use]
    pub fn kind(self) -> BackendKind {
        match self {
            Self::ClaudeMax | Self::OpenAICodex => BackendKind::OAuthProxy,
            Self::Gateway => BackendKind::MultiVendorGateway,
            _ => BackendKind::DirectVendor,
        }
    }

    /// Returns the authentication strategy for this backend.
    #[must_use]
    pub fn auth(self) -> AuthStrategy {
        match self {
            Self::ClaudeMax => AuthStrategy::OAuth(ProviderId::ClaudeMax),
            Self::OpenAICodex => AuthStrategy::OAuth(ProviderId::OpenAICodex),
            _ => AuthStrategy::ApiKey,
        }
    }

    /// Returns the wire protocol the backend speaks.
    #[must_use]
    pub fn protocol(self) -> ProtocolFormat {
        match self {
            Self::ClaudeMax | Self::Anthropic => ProtocolFormat::Anthropic,
            Self::OpenAICodex => ProtocolFormat::Responses,
            _ => ProtocolFormat::ChatCompletions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_display() {
        assert_eq!(ProviderId::ClaudeMax.to_string(), "claude-max");
        assert_eq!(ProviderId::OpenAICodex.to_string(), "openai-codex");
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(
            ProviderId::from_str("claude").unwrap(),
            ProviderId::ClaudeMax
        );
        assert_eq!(
            ProviderId::from_str("codex").unwrap(),
            ProviderId::OpenAICodex
        );
        assert!(ProviderId::from_str("xyz").is_err());
    }

    #[test]
    fn test_serde_matches_display() {
        for p in ProviderId::all() {
            let json = serde_json::to_string(p).unwrap();
            assert_eq!(json, format!("\"{p}\""));
        }
    }

    #[test]
    fn test_backend_classification() {
        assert_eq!(Backend::ClaudeMax.kind(), BackendKind::OAuthProxy);
        assert_eq!(Backend::Gateway.kind(), BackendKind::MultiVendorGateway);
        assert_eq!(Backend::Groq.kind(), BackendKind::DirectVendor);
        assert_eq!(
            Backend::OpenAICodex.auth(),
            AuthStrategy::OAuth(ProviderId::OpenAICodex)
        );
        assert_eq!(Backend::Anthropic.auth(), AuthStrategy::ApiKey);
        assert_eq!(Backend::Anthropic.protocol(), ProtocolFormat::Anthropic);
        assert_eq!(Backend::Xai.protocol(), ProtocolFormat::ChatCompletions);
    }

    #[test]
    fn test_backend_serde_snake_case() {
        let b: Backend = serde_json::from_str("\"openai_codex\"").unwrap();
        assert_eq!(b, Backend::OpenAICodex);
        let g: Backend = serde_json::from_str("\"groq\"").unwrap();
        assert_eq!(g, Backend::Groq);
    }
}
