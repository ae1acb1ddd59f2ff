//! `OpenAI` Codex OAuth profile.
//!
//! Access tokens are JWTs whose payload carries the `ChatGPT` account id under
//! the `https://api.openai.com/auth` namespace. The Codex backend rejects
//! requests without it.

use crate::profile::{ClaimPath, OAuthProfile};
use relaygate_types::ProviderId;

/// OAuth 2.0 client ID for Codex CLI.
pub const CLIENT_ID: &str = "app_EMoamEEZ73f0CkXaXp7hrann";

/// `OpenAI` OAuth token endpoint.
pub const TOKEN_URL: &str = "https://auth.openai.com/oauth/token";

/// JWT payload namespace holding the account claims.
pub const AUTH_CLAIM_NAMESPACE: &str = "https://api.openai.com/auth";

pub const PROFILE: OAuthProfile = OAuthProfile {
    provider: ProviderId::OpenAICodex,
    token_url: TOKEN_URL,
    client_id: CLIENT_ID,
    refresh_token_env: "OPENAI_CODEX_REFRESH_TOKEN",
    config_section: "openai_codex",
    claim: Some(ClaimPath {
        namespace: AUTH_CLAIM_NAMESPACE,
        field: "chatgpt_account_id",
    }),
};
