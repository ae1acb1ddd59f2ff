//! Claude Max OAuth profile.
//!
//! Uses the Claude CLI's public client id. The access token is an opaque
//! bearer token with no account claim.

use crate::profile::OAuthProfile;
use relaygate_types::ProviderId;

/// OAuth 2.0 client ID for Claude.
pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Claude OAuth token endpoint.
pub const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";

pub const PROFILE: OAuthProfile = OAuthProfile {
    provider: ProviderId::ClaudeMax,
    token_url: TOKEN_URL,
    client_id: CLIENT_ID,
    refresh_token_env: "CLAUDE_MAX_REFRESH_TOKEN",
    config_section: "claude_max",
    claim: None,
};
