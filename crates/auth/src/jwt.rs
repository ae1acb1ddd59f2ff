//! Unverified JWT payload inspection.
//!
//! Only reads claims the upstream needs echoed back; signatures are not checked.

use crate::profile::ClaimPath;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;

/// Decode the payload segment of a JWT.
#[must_use]
pub fn decode_payload(token: &str) -> Option<Value> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Extract a non-empty string claim.
#[must_use]
pub fn extract_claim(token: &str, path: ClaimPath) -> Option<String> {
    decode_payload(token)?
        .get(path.namespace)?
        .get(path.field)?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) fn make_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.sig")
}
