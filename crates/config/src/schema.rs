use relaygate_types::{Backend, ProviderId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// OAuth client settings for one consumer-plan provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Overrides the provider's built-in client id.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Static refresh token used when the cache holds none.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// OAuth settings keyed by provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthSection {
    #[serde(default)]
    pub claude_max: OAuthConfig,
    #[serde(default)]
    pub openai_codex: OAuthConfig,
}

impl OAuthSection {
    #[must_use]
    pub fn get(&self, provider: ProviderId) -> &OAuthConfig {
        match provider {
            ProviderId::ClaudeMax => &self.claude_max,
            ProviderId::OpenAICodex => &self.openai_codex,
        }
    }
}

/// Connection settings for one API-key backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the backend's built-in base URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// API-key backends keyed by vendor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsSection {
    #[serde(default)]
    pub gateway: BackendConfig,
    #[serde(default)]
    pub anthropic: BackendConfig,
    #[serde(default)]
    pub openai: BackendConfig,
    #[serde(default)]
    pub xai: BackendConfig,
    #[serde(default)]
    pub google: BackendConfig,
    #[serde(default)]
    pub groq: BackendConfig,
    #[serde(default)]
    pub venice: BackendConfig,
    /// Base URL override for the Claude Max backend.
    #[serde(default)]
    pub claude_max_base_url: Option<String>,
    /// Base URL override for the Codex backend.
    #[serde(default)]
    pub openai_codex_base_url: Option<String>,
}

impl BackendsSection {
    /// Settings for an API-key backend. OAuth backends have none.
    #[must_use]
    pub fn get(&self, backend: Backend) -> Option<&BackendConfig> {
        match backend {
            Backend::Gateway => Some(&self.gateway),
            Backend::Anthropic => Some(&self.anthropic),
            Backend::OpenAI => Some(&self.openai),
            Backend::Xai => Some(&self.xai),
            Backend::Google => Some(&self.google),
            Backend::Groq => Some(&self.groq),
            Backend::Venice => Some(&self.venice),
            Backend::ClaudeMax | Backend::OpenAICodex => None,
        }
    }

    fn get_mut(&mut self, backend: Backend) -> Option<&mut BackendConfig> {
        match backend {
            Backend::Gateway => Some(&mut self.gateway),
            Backend::Anthropic => Some(&mut self.anthropic),
            Backend::OpenAI => Some(&mut self.openai),
            Backend::Xai => Some(&mut self.xai),
            Backend::Google => Some(&mut self.google),
            Backend::Groq => Some(&mut self.groq),
            Backend::Venice => Some(&mut self.venice),
            Backend::ClaudeMax | Backend::OpenAICodex => None,
        }
    }
}

/// Upstash Redis REST credentials for the token cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub upstash_url: Option<String>,
    #[serde(default)]
    pub upstash_token: Option<String>,
}

/// The always-available backend used when the primary one fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_backend")]
    pub backend: Backend,
    #[serde(default = "default_fallback_model")]
    pub model: String,
    /// Model name reported to clients when the fallback served the request.
    /// Also the sentinel that routes straight to the fallback.
    #[serde(default = "default_fallback_public")]
    pub public_name: String,
}

fn default_fallback_backend() -> Backend {
    Backend::Groq
}
fn default_fallback_model() -> String {
    "openai/gpt-oss-120b".to_string()
}
fn default_fallback_public() -> String {
    "groq-fallback".to_string()
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            backend: default_fallback_backend(),
            model: default_fallback_model(),
            public_name: default_fallback_public(),
        }
    }
}

/// Token and reasoning budget constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Budget for the `-think-low` suffix.
    pub think_low: u32,
    /// Budget for the `-think-medium` suffix.
    pub think_medium: u32,
    /// Budget for the `-think-high` suffix.
    pub think_high: u32,
    /// Default reasoning budget for Claude Max Opus models.
    pub claude_max_opus_default: u32,
    /// Default reasoning budget for other Claude Max models.
    pub claude_max_default: u32,
    /// Output tokens added on top of the reasoning budget.
    pub headroom: u32,
    /// Output cap when reasoning is disabled.
    pub default_max_tokens: u32,
    /// Output tokens always left over after the reasoning budget.
    pub min_output_reserve: u32,
    /// Budgets below this disable reasoning.
    pub min_reasoning_budget: u32,
    pub claude_max_opus_ceiling: u32,
    pub claude_max_ceiling: u32,
    pub default_ceiling: u32,
    pub fallback_ceiling: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            think_low: 10_000,
            think_medium: 32_000,
            think_high: 128_000,
            claude_max_opus_default: 128_000,
            claude_max_default: 10_000,
            headroom: 16_000,
            default_max_tokens: 16_000,
            min_output_reserve: 1_000,
            min_reasoning_budget: 1_024,
            claude_max_opus_ceiling: 128_000,
            claude_max_ceiling: 64_000,
            default_ceiling: 128_000,
            fallback_ceiling: 65_536,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_port() -> u16 {
    8018
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_model() -> String {
    "claude-opus-4-6".to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 8018).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub oauth: OAuthSection,
    #[serde(default)]
    pub backends: BackendsSection,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub budgets: BudgetConfig,
    /// Public model used when a request names none.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Extra public → internal model mappings, merged over the built-in table.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Outbound HTTP proxy for all upstream calls.
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            log: LogConfig::default(),
            cache: CacheConfig::default(),
            oauth: OAuthSection::default(),
            backends: BackendsSection::default(),
            fallback: FallbackConfig::default(),
            budgets: BudgetConfig::default(),
            default_model: default_model(),
            aliases: HashMap::new(),
            proxy_url: None,
        }
    }
}

/// Well-known environment variables consulted for secrets left unset by the
/// file and the `RELAYGATE_` variables.
const LEGACY_BACKEND_KEYS: &[(Backend, &str)] = &[
    (Backend::Gateway, "AI_GATEWAY_API_KEY"),
    (Backend::Anthropic, "ANTHROPIC_API_KEY"),
    (Backend::OpenAI, "OPENAI_API_KEY"),
    (Backend::Xai, "XAI_API_KEY"),
    (Backend::Google, "GOOGLE_GENERATIVE_AI_API_KEY"),
    (Backend::Groq, "GROQ_API_KEY"),
    (Backend::Venice, "VENICE_API_KEY"),
];

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from defaults, an optional YAML file, and
    /// `RELAYGATE_`-prefixed environment variables (`__` separates nested keys),
    /// then fills unset secrets from the well-known legacy variables.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let mut config: Config = figment
            .merge(Env::prefixed("RELAYGATE_").split("__"))
            .extract()?;
        config.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Fills unset secrets from legacy variable names via `lookup`.
    pub fn apply_legacy_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.is_none() {
                *slot = lookup(key).filter(|v| !v.is_empty());
            }
        };
        fill(&mut self.cache.upstash_url, "UPSTASH_REDIS_URL");
        fill(&mut self.cache.upstash_token, "UPSTASH_REDIS_TOKEN");
        fill(
            &mut self.oauth.claude_max.refresh_token,
            "CLAUDE_MAX_REFRESH_TOKEN",
        );
        fill(
            &mut self.oauth.openai_codex.refresh_token,
            "OPENAI_CODEX_REFRESH_TOKEN",
        );
        fill(&mut self.oauth.openai_codex.client_id, "OPENAI_CODEX_CLIENT_ID");
        for &(backend, key) in LEGACY_BACKEND_KEYS {
            if let Some(cfg) = self.backends.get_mut(backend) {
                fill(&mut cfg.api_key, key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_YAML: &str = r#"
port: 9000
host: "0.0.0.0"
log:
  format: json
oauth:
  claude_max:
    refresh_token: "rt-claude"
backends:
  groq:
    api_key: "gsk-test"
  gateway:
    base_url: "http://localhost:9999/v1"
budgets:
  headroom: 8000
aliases:
  fast: "groq/llama-3.3-70b-versatile"
"#;

    #[test]
    fn test_default_config() {
        let c = Config::default();
        assert_eq!(c.port, 8018);
        assert_eq!(c.host, "127.0.0.1");
        assert_eq!(c.fallback.public_name, "groq-fallback");
        assert_eq!(c.fallback.backend, Backend::Groq);
        assert_eq!(c.budgets.fallback_ceiling, 65_536);
        assert_eq!(c.default_model, "claude-opus-4-6");
        assert!(c.aliases.is_empty());
    }

    #[test]
    fn test_from_yaml_port_and_host() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.port, 9000);
        assert_eq!(c.host, "0.0.0.0");
        assert_eq!(c.log.format, LogFormat::Json);
        assert_eq!(c.log.level, "info");
    }

    #[test]
    fn test_from_yaml_sections() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(
            c.oauth.get(ProviderId::ClaudeMax).refresh_token.as_deref(),
            Some("rt-claude")
        );
        assert!(c.oauth.get(ProviderId::OpenAICodex).refresh_token.is_none());
        assert_eq!(
            c.backends.get(Backend::Groq).unwrap().api_key.as_deref(),
            Some("gsk-test")
        );
        assert_eq!(
            c.backends.get(Backend::Gateway).unwrap().base_url.as_deref(),
            Some("http://localhost:9999/v1")
        );
        assert!(c.backends.get(Backend::ClaudeMax).is_none());
        assert_eq!(c.aliases.get("fast").unwrap(), "groq/llama-3.3-70b-versatile");
    }

    #[test]
    fn test_partial_budgets_keep_defaults() {
        let c = Config::from_yaml(SAMPLE_YAML).unwrap();
        assert_eq!(c.budgets.headroom, 8000);
        assert_eq!(c.budgets.min_output_reserve, 1000);
        assert_eq!(c.budgets.think_high, 128_000);
    }

    #[test]
    fn test_from_yaml_defaults_applied() {
        let c = Config::from_yaml("port: 1234").unwrap();
        assert_eq!(c.port, 1234);
        assert_eq!(c.host, "127.0.0.1");
    }

    #[test]
    fn test_legacy_env_fills_unset_only() {
        let mut c = Config::from_yaml(SAMPLE_YAML).unwrap();
        c.apply_legacy_env(|key| match key {
            "CLAUDE_MAX_REFRESH_TOKEN" => Some("from-env".into()),
            "OPENAI_CODEX_REFRESH_TOKEN" => Some("codex-env".into()),
            "GROQ_API_KEY" => Some("env-groq".into()),
            "XAI_API_KEY" => Some("xai-env".into()),
            "UPSTASH_REDIS_URL" => Some(String::new()),
            _ => None,
        });
        assert_eq!(c.oauth.claude_max.refresh_token.as_deref(), Some("rt-claude"));
        assert_eq!(c.oauth.openai_codex.refresh_token.as_deref(), Some("codex-env"));
        assert_eq!(c.backends.groq.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(c.backends.xai.api_key.as_deref(), Some("xai-env"));
        assert!(c.cache.upstash_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relaygate.yaml");
        std::fs::write(&path, "port: 4321\nfallback:\n  model: llama\n").unwrap();
        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.port, 4321);
        assert_eq!(c.fallback.model, "llama");
        assert_eq!(c.fallback.public_name, "groq-fallback");
    }
}
