//! Credential store on top of the Upstash Redis REST API.
//!
//! Each operation is one `POST <url>` whose JSON body is the Redis command as
//! an array of strings. Replies are `{"result": ...}` or `{"error": "..."}`.

use async_trait::async_trait;
use relaygate_types::{CredentialStore, GatewayError, Result};
use rquest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// A [`CredentialStore`] backed by Upstash Redis over HTTPS.
pub struct UpstashCredentialStore {
    http: Client,
    url: String,
    token: String,
}

impl UpstashCredentialStore {
    #[must_use]
    pub fn new(http: Client, url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn command(&self, args: &[&str]) -> Result<Value> {
        tracing::trace!(command = args.first().copied().unwrap_or_default(), "upstash");
        let resp = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&args)
            .send()
            .await
            .map_err(|e| GatewayError::CacheUnavailable(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GatewayError::CacheUnavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(GatewayError::CacheUnavailable(format!(
                "status={} body={text}",
                status.as_u16()
            )));
        }
        parse_reply(&text)
    }
}

fn parse_reply(text: &str) -> Result<Value> {
    let reply: Reply = serde_json::from_str(text)
        .map_err(|e| GatewayError::CacheUnavailable(format!("bad reply: {e}")))?;
    if let Some(err) = reply.error {
        return Err(GatewayError::CacheUnavailable(err));
    }
    Ok(reply.result)
}

fn set_command<'a>(key: &'a str, value: &'a str, ttl_secs: Option<&'a str>) -> Vec<&'a str> {
    let mut cmd = vec!["SET", key, value];
    if let Some(secs) = ttl_secs {
        cmd.extend(["EX", secs]);
    }
    cmd
}

#[async_trait]
impl CredentialStore for UpstashCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.command(&["GET", key]).await? {
            Value::String(s) => Ok(Some(s)),
            Value::Null => Ok(None),
            other => Ok(Some(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let secs = ttl.map(|t| t.as_secs().max(1).to_string());
        self.command(&set_command(key, value, secs.as_deref())).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.command(&["DEL", key]).await?;
        Ok(())
    }
}
