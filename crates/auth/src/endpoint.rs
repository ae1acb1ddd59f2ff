//! HTTP implementation of the refresh-token grant.

use async_trait::async_trait;
use relaygate_types::{GatewayError, ProviderId, RefreshRequest, Result, TokenEndpoint, TokenGrant};
use serde_json::Value;

/// Posts form-encoded refresh grants with `rquest`.
#[derive(Clone)]
pub struct HttpTokenEndpoint {
    http: rquest::Client,
}

impl HttpTokenEndpoint {
    #[must_use]
    pub fn new(http: rquest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    async fn refresh(&self, request: &RefreshRequest) -> Result<TokenGrant> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", request.client_id.as_str()),
            ("refresh_token", request.refresh_token.as_str()),
        ];
        let resp = self
            .http
            .post(&request.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::RefreshFailed {
                provider: request.provider,
                status,
                body: text,
            });
        }
        let json: Value = serde_json::from_str(&text).map_err(|e| GatewayError::RefreshFailed {
            provider: request.provider,
            status,
            body: format!("invalid JSON: {e}"),
        })?;
        parse_token_response(request.provider, status, &json)
    }
}

/// Parse a token endpoint body. `access_token` and numeric `expires_in` are
/// required.
///
/// # Errors
///
/// Returns [`GatewayError::RefreshFailed`] if a required field is missing.
pub fn parse_token_response(provider: ProviderId, status: u16, json: &Value) -> Result<TokenGrant> {
    let missing = |field: &str| GatewayError::RefreshFailed {
        provider,
        status,
        body: format!("missing {field} in token response"),
    };
    let access_token = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("access_token"))?
        .to_string();
    let expires_in = json
        .get("expires_in")
        .and_then(Value::as_u64)
        .ok_or_else(|| missing("expires_in"))?;
    let refresh_token = json
        .get("refresh_token")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(TokenGrant {
        access_token,
        refresh_token,
        expires_in,
    })
}
