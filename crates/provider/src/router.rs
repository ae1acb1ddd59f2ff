//! Model routing: public model names → internal ids → backend descriptors.
//!
//! Resolution never fails. Internal `prefix/model` ids pass through, the
//! fallback sentinel routes to the fallback backend, short names go through
//! the alias table, and anything else falls back to the default model.

use relaygate_config::{BudgetConfig, Config, FallbackConfig};
use relaygate_types::{Backend, ModelDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `created` timestamp reported for every listed model.
pub const MODEL_CREATED: u64 = 1_700_000_000;

/// Internal id used for the fallback route.
pub const FALLBACK_INTERNAL_ID: &str = "__fallback__";

/// Static public → internal aliases, in listing order.
const ALIASES: &[(&str, &str)] = &[
    ("claude-opus-4-6", "claude-max-direct/claude-opus-4-6"),
    ("claude-opus", "claude-max-direct/claude-opus-4-6"),
    ("claude-sonnet-4-5", "claude-max-direct/claude-sonnet-4-5"),
    ("claude-sonnet", "claude-max-direct/claude-sonnet-4-5"),
    ("claude-haiku-4-5", "claude-max-direct/claude-haiku-4-5"),
    ("claude-haiku", "claude-max-direct/claude-haiku-4-5"),
    ("gpt-5.3-codex", "openai-codex-direct/gpt-5.3-codex"),
    ("codex", "openai-codex-direct/gpt-5.3-codex"),
];

/// Internal id prefixes and the backend each selects. Ids with any other
/// prefix go to the multi-vendor gateway unchanged.
const PREFIXES: &[(&str, Backend)] = &[
    ("claude-max-direct/", Backend::ClaudeMax),
    ("claude-max/", Backend::ClaudeMax),
    ("openai-codex-direct/", Backend::OpenAICodex),
    ("openai-codex/", Backend::OpenAICodex),
    ("anthropic-direct/", Backend::Anthropic),
    ("openai-direct/", Backend::OpenAI),
    ("xai-direct/", Backend::Xai),
    ("google-direct/", Backend::Google),
    ("groq/", Backend::Groq),
    ("venice/", Backend::Venice),
];

/// Outcome of [`ModelRouter::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Name reported back to the client.
    pub public_id: String,
    pub internal_id: String,
    pub use_fallback: bool,
}

/// One entry of `GET /models`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelEntry>,
}

/// Resolves public model names. Built from a configuration snapshot.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    /// Static aliases overlaid with configured ones.
    aliases: Vec<(String, String)>,
    default_model: String,
    fallback: FallbackConfig,
    budgets: BudgetConfig,
}

impl ModelRouter {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let mut aliases: Vec<(String, String)> = ALIASES
            .iter()
            .map(|(p, i)| ((*p).to_string(), (*i).to_string()))
            .collect();
        let mut extra: Vec<(&String, &String)> = config.aliases.iter().collect();
        extra.sort();
        for (public, internal) in extra {
            match aliases.iter_mut().find(|(p, _)| p == public) {
                Some(entry) => entry.1.clone_from(internal),
                None => aliases.push((public.clone(), internal.clone())),
            }
        }
        Self {
            aliases,
            default_model: config.default_model.clone(),
            fallback: config.fallback.clone(),
            budgets: config.budgets.clone(),
        }
    }

    fn alias(&self, public: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(p, _)| p == public)
            .map(|(_, i)| i.as_str())
    }

    /// Internal id of the default model.
    fn default_internal(&self) -> String {
        if self.default_model.contains('/') {
            return self.default_model.clone();
        }
        self.alias(&self.default_model)
            .unwrap_or(ALIASES[0].1)
            .to_string()
    }

    /// Resolve a client-supplied model name.
    #[must_use]
    pub fn resolve(&self, model: Option<&str>) -> Resolution {
        let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) else {
            return Resolution {
                public_id: self.default_model.clone(),
                internal_id: self.default_internal(),
                use_fallback: false,
            };
        };

        if model == self.fallback.public_name {
            return Resolution {
                public_id: model.to_string(),
                internal_id: FALLBACK_INTERNAL_ID.to_string(),
                use_fallback: true,
            };
        }

        if model.contains('/') {
            return Resolution {
                public_id: model.to_string(),
                internal_id: model.to_string(),
                use_fallback: false,
            };
        }

        let internal_id = match self.alias(model) {
            Some(internal) => internal.to_string(),
            None => {
                tracing::debug!(model, "unknown model, using default");
                self.default_internal()
            }
        };
        Resolution {
            public_id: model.to_string(),
            internal_id,
            use_fallback: false,
        }
    }

    /// Build the descriptor for a resolution.
    #[must_use]
    pub fn describe(&self, resolution: &Resolution) -> ModelDescriptor {
        if resolution.use_fallback {
            let mut d = self.fallback_descriptor();
            d.public_id.clone_from(&resolution.public_id);
            return d;
        }
        let (backend, rest) = split_internal(&resolution.internal_id);
        let (upstream_model, suffix_budget) = strip_budget_suffix(backend, rest, &self.budgets);
        let opus = backend == Backend::ClaudeMax && upstream_model.contains("claude-opus");
        let b = &self.budgets;
        let (default_budget, output_ceiling) = match backend {
            Backend::ClaudeMax if opus => {
                (Some(b.claude_max_opus_default), b.claude_max_opus_ceiling)
            }
            Backend::ClaudeMax => (Some(b.claude_max_default), b.claude_max_ceiling),
            _ => (None, b.default_ceiling),
        };
        ModelDescriptor {
            public_id: resolution.public_id.clone(),
            internal_id: resolution.internal_id.clone(),
            backend,
            upstream_model,
            suffix_budget,
            default_budget,
            output_ceiling,
        }
    }

    /// Descriptor of the fallback backend, reported under its public name.
    #[must_use]
    pub fn fallback_descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            public_id: self.fallback.public_name.clone(),
            internal_id: FALLBACK_INTERNAL_ID.to_string(),
            backend: self.fallback.backend,
            upstream_model: self.fallback.model.clone(),
            suffix_budget: None,
            default_budget: None,
            output_ceiling: self.budgets.fallback_ceiling,
        }
    }

    /// Every exposed model: the aliases plus the fallback sentinel.
    #[must_use]
    pub fn models(&self) -> ModelList {
        let mut data: Vec<ModelEntry> = self
            .aliases
            .iter()
            .map(|(public, internal)| entry(public, owner(split_internal(internal).0, internal)))
            .collect();
        data.push(entry(&self.fallback.public_name, self.fallback.backend.to_string()));
        ModelList {
            object: "list".to_string(),
            data,
        }
    }
}

fn entry(id: &str, owned_by: String) -> ModelEntry {
    ModelEntry {
        id: id.to_string(),
        object: "model".to_string(),
        created: MODEL_CREATED,
        owned_by,
    }
}

fn owner(backend: Backend, internal_id: &str) -> String {
    match backend {
        Backend::ClaudeMax | Backend::Anthropic => "anthropic".to_string(),
        Backend::OpenAICodex | Backend::OpenAI => "openai".to_string(),
        Backend::Gateway => internal_id
            .split_once('/')
            .map_or("gateway", |(vendor, _)| vendor)
            .to_string(),
        other => other.to_string(),
    }
}

/// Split an internal id into its backend and the remaining model name.
#[must_use]
pub fn split_internal(internal_id: &str) -> (Backend, &str) {
    PREFIXES
        .iter()
        .find_map(|(prefix, backend)| internal_id.strip_prefix(prefix).map(|rest| (*backend, rest)))
        .unwrap_or((Backend::Gateway, internal_id))
}

/// Remove a reasoning-budget suffix from an upstream model name.
///
/// `-thinking-<N>` encodes an explicit budget and `-think-low|medium|high`
/// a configured level. The gateway also accepts a bare `-thinking` marker,
/// which is stripped without a budget.
#[must_use]
pub fn strip_budget_suffix(
    backend: Backend,
    model: &str,
    budgets: &BudgetConfig,
) -> (String, Option<u32>) {
    if let Some((base, n)) = model.rsplit_once("-thinking-")
        && let Ok(budget) = n.parse::<u32>()
    {
        return (base.to_string(), Some(budget));
    }
    for (suffix, budget) in [
        ("-think-low", budgets.think_low),
        ("-think-medium", budgets.think_medium),
        ("-think-high", budgets.think_high),
    ] {
        if let Some(base) = model.strip_suffix(suffix) {
            return (base.to_string(), Some(budget));
        }
    }
    if backend == Backend::Gateway
        && let Some(base) = model.strip_suffix("-thinking")
    {
        return (base.to_string(), None);
    }
    (model.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        ModelRouter::new(&Config::default())
    }

    #[test]
    fn test_missing_model_uses_default() {
        let r = router().resolve(None);
        assert_eq!(r.public_id, "claude-opus-4-6");
        assert_eq!(r.internal_id, "claude-max-direct/claude-opus-4-6");
        assert!(!r.use_fallback);
        assert_eq!(router().resolve(Some("  ")), r);
    }

    #[test]
    fn test_sentinel_routes_to_fallback() {
        let r = router().resolve(Some("groq-fallback"));
        assert!(r.use_fallback);
        assert_eq!(r.public_id, "groq-fallback");
        let d = router().describe(&r);
        assert_eq!(d.backend, Backend::Groq);
        assert_eq!(d.upstream_model, "openai/gpt-oss-120b");
        assert_eq!(d.output_ceiling, 65_536);
    }

    #[test]
    fn test_internal_ids_pass_through() {
        let r = router().resolve(Some("claude-max-direct/claude-haiku-4-5"));
        assert_eq!(r.internal_id, "claude-max-direct/claude-haiku-4-5");
        assert_eq!(r.public_id, "claude-max-direct/claude-haiku-4-5");
        let r = router().resolve(Some("anthropic/claude-sonnet-4.5"));
        assert_eq!(r.internal_id, "anthropic/claude-sonnet-4.5");
    }

    #[test]
    fn test_alias_and_unknown() {
        let r = router().resolve(Some("codex"));
        assert_eq!(r.internal_id, "openai-codex-direct/gpt-5.3-codex");
        assert_eq!(r.public_id, "codex");

        let r = router().resolve(Some("totally-unknown"));
        assert_eq!(r.public_id, "totally-unknown");
        assert_eq!(r.internal_id, "claude-max-direct/claude-opus-4-6");
    }

    #[test]
    fn test_configured_aliases_override() {
        let mut cfg = Config::default();
        cfg.aliases
            .insert("claude-opus".into(), "anthropic-direct/claude-opus-4-6".into());
        cfg.aliases
            .insert("grok".into(), "xai-direct/grok-4".into());
        let router = ModelRouter::new(&cfg);
        assert_eq!(
            router.resolve(Some("claude-opus")).internal_id,
            "anthropic-direct/claude-opus-4-6"
        );
        assert_eq!(router.resolve(Some("grok")).internal_id, "xai-direct/grok-4");
        assert!(router.models().data.iter().any(|m| m.id == "grok" && m.owned_by == "xai"));
    }

    #[test]
    fn test_describe_claude_max_tiers() {
        let r = router();
        let opus = r.describe(&r.resolve(Some("claude-opus")));
        assert_eq!(opus.backend, Backend::ClaudeMax);
        assert_eq!(opus.upstream_model, "claude-opus-4-6");
        assert_eq!(opus.default_budget, Some(128_000));
        assert_eq!(opus.output_ceiling, 128_000);

        let haiku = r.describe(&r.resolve(Some("claude-haiku")));
        assert_eq!(haiku.default_budget, Some(10_000));
        assert_eq!(haiku.output_ceiling, 64_000);

        let codex = r.describe(&r.resolve(Some("codex")));
        assert_eq!(codex.backend, Backend::OpenAICodex);
        assert_eq!(codex.default_budget, None);
        assert_eq!(codex.output_ceiling, 128_000);
    }

    #[test]
    fn test_describe_prefixes() {
        let r = router();
        let cases = [
            ("claude-max/claude-opus-4-6", Backend::ClaudeMax, "claude-opus-4-6"),
            ("anthropic-direct/claude-sonnet-4-5", Backend::Anthropic, "claude-sonnet-4-5"),
            ("openai-direct/gpt-5", Backend::OpenAI, "gpt-5"),
            ("xai-direct/grok-4", Backend::Xai, "grok-4"),
            ("google-direct/gemini-2.5-pro", Backend::Google, "gemini-2.5-pro"),
            ("groq/llama-3.3-70b", Backend::Groq, "llama-3.3-70b"),
            ("venice/venice-uncensored", Backend::Venice, "venice-uncensored"),
            ("openai/gpt-5", Backend::Gateway, "openai/gpt-5"),
        ];
        for (id, backend, upstream) in cases {
            let d = r.describe(&r.resolve(Some(id)));
            assert_eq!(d.backend, backend, "{id}");
            assert_eq!(d.upstream_model, upstream, "{id}");
        }
    }

    #[test]
    fn test_budget_suffixes() {
        let b = BudgetConfig::default();
        assert_eq!(
            strip_budget_suffix(Backend::Anthropic, "claude-opus-4-6-think-high", &b),
            ("claude-opus-4-6".to_string(), Some(128_000))
        );
        assert_eq!(
            strip_budget_suffix(Backend::Anthropic, "claude-sonnet-4-5-think-low", &b),
            ("claude-sonnet-4-5".to_string(), Some(10_000))
        );
        assert_eq!(
            strip_budget_suffix(Backend::ClaudeMax, "claude-opus-4-6-thinking-4096", &b),
            ("claude-opus-4-6".to_string(), Some(4096))
        );
        assert_eq!(
            strip_budget_suffix(Backend::Gateway, "anthropic/claude-sonnet-4.5-thinking", &b),
            ("anthropic/claude-sonnet-4.5".to_string(), None)
        );
        assert_eq!(
            strip_budget_suffix(Backend::OpenAI, "gpt-5-thinking", &b),
            ("gpt-5-thinking".to_string(), None)
        );
        assert_eq!(
            strip_budget_suffix(Backend::OpenAI, "gpt-5-thinking-abc", &b),
            ("gpt-5-thinking-abc".to_string(), None)
        );
    }

    #[test]
    fn test_models_list() {
        let list = router().models();
        assert_eq!(list.object, "list");
        assert_eq!(list.data.len(), 9);
        assert!(list.data.iter().all(|m| m.created == MODEL_CREATED && m.object == "model"));
        let find = |id: &str| list.data.iter().find(|m| m.id == id).unwrap().owned_by.clone();
        assert_eq!(find("claude-opus-4-6"), "anthropic");
        assert_eq!(find("codex"), "openai");
        assert_eq!(find("groq-fallback"), "groq");
    }
}
