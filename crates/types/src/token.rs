//! OAuth token representation and expiry logic.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Safety margin before the real expiry past which a cached token is
/// no longer handed out.
pub const EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);

/// Current Unix time in milliseconds.
#[must_use]
pub fn now_millis() -> u64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Current Unix time in seconds.
#[must_use]
pub fn now_secs() -> u64 {
    now_millis() / 1000
}

/// A usable access token as returned by the token manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub access_token: String,
    /// Account-scoped claim embedded in the token, for providers that need one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    /// Absolute expiry in Unix milliseconds.
    pub expires_at_ms: u64,
}

impl AccessGrant {
    /// Return `true` if the token may still be used at `now_ms`, i.e.
    /// `now_ms < expires_at_ms - buffer`.
    #[must_use]
    pub fn is_usable_at(&self, now_ms: u64, buffer: Duration) -> bool {
        let buffer_ms = u64::try_from(buffer.as_millis()).unwrap_or(u64::MAX);
        now_ms < self.expires_at_ms.saturating_sub(buffer_ms)
    }

    /// Seconds until the hard expiry, saturating at zero.
    #[must_use]
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_at_ms.saturating_sub(now_millis()) / 1000
    }
}

/// The parsed body of a successful refresh-token grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the provider rotated the refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
}

impl TokenGrant {
    /// Absolute expiry in Unix milliseconds, counted from `now_ms`.
    #[must_use]
    pub fn expires_at_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_add(self.expires_in.saturating_mul(1000))
    }

    /// TTL for the cached access token: slightly shorter than the real lifetime,
    /// never below one second.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.expires_in.saturating_sub(60).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(expires_at_ms: u64) -> AccessGrant {
        AccessGrant {
            access_token: "tok".into(),
            account_id: None,
            expires_at_ms,
        }
    }

    #[test]
    fn test_usable_well_before_expiry() {
        let now = 1_000_000_000;
        let g = grant(now + 10 * 60 * 1000);
        assert!(g.is_usable_at(now, EXPIRY_BUFFER));
    }

    #[test]
    fn test_not_usable_inside_buffer() {
        let now = 1_000_000_000;
        let g = grant(now + 4 * 60 * 1000);
        assert!(!g.is_usable_at(now, EXPIRY_BUFFER));
    }

    #[test]
    fn test_boundary_is_not_usable() {
        let now = 1_000_000_000;
        let g = grant(now + 5 * 60 * 1000);
        assert!(!g.is_usable_at(now, EXPIRY_BUFFER));
        assert!(g.is_usable_at(now - 1, EXPIRY_BUFFER));
    }

    #[test]
    fn test_expired_long_ago() {
        assert!(!grant(10).is_usable_at(1_000_000, EXPIRY_BUFFER));
    }

    #[test]
    fn test_cache_ttl_floor() {
        let g = TokenGrant {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: 30,
        };
        assert_eq!(g.cache_ttl(), Duration::from_secs(1));

        let g = TokenGrant {
            expires_in: 3600,
            ..g
        };
        assert_eq!(g.cache_ttl(), Duration::from_secs(3540));
        assert_eq!(g.expires_at_ms(1_000), 3_601_000);
    }

    #[test]
    fn test_grant_deserialize_optional_refresh() {
        let g: TokenGrant =
            serde_json::from_str(r#"{"access_token":"a","expires_in":28800}"#).unwrap();
        assert!(g.refresh_token.is_none());
        assert_eq!(g.expires_in, 28800);
    }

    #[test]
    fn test_access_grant_skips_none_account() {
        let json = serde_json::to_string(&grant(1)).unwrap();
        assert!(!json.contains("account_id"));
    }
}
