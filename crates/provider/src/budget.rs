//! Output-token and reasoning-budget resolution.

use relaygate_config::BudgetConfig;
use relaygate_types::ModelDescriptor;

/// Final numbers sent to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_output_tokens: u32,
    /// `None` disables reasoning.
    pub reasoning_budget: Option<u32>,
}

/// Resolve the budget for a primary invocation.
///
/// Reasoning budget precedence: caller > model-name suffix > tier default.
/// The cap is the caller's `max_tokens` when given, else the budget plus
/// head-room (or the plain default without reasoning), clamped to the tier
/// ceiling. A budget that would leave less than the output reserve is shrunk
/// to `cap - reserve`; one shrunk below the usable minimum disables reasoning.
#[must_use]
pub fn resolve_budget(
    model: &ModelDescriptor,
    caller_budget: Option<u32>,
    caller_max_tokens: Option<u32>,
    config: &BudgetConfig,
) -> Budget {
    let mut reasoning = caller_budget
        .or(model.suffix_budget)
        .or(model.default_budget)
        .filter(|&b| b > 0);

    let cap = caller_max_tokens
        .unwrap_or_else(|| match reasoning {
            Some(b) => b.saturating_add(config.headroom),
            None => config.default_max_tokens,
        })
        .min(model.output_ceiling);

    if let Some(b) = reasoning
        && cap.saturating_sub(b) < config.min_output_reserve
    {
        reasoning = Some(cap.saturating_sub(config.min_output_reserve));
    }
    let reasoning_budget = reasoning.filter(|&b| b >= config.min_reasoning_budget);

    Budget {
        max_output_tokens: cap,
        reasoning_budget,
    }
}

/// Budget for the fallback retry: the caller's cap (or the default) clamped to
/// the fallback ceiling, never with reasoning.
#[must_use]
pub fn fallback_budget(caller_max_tokens: Option<u32>, config: &BudgetConfig) -> Budget {
    Budget {
        max_output_tokens: caller_max_tokens
            .unwrap_or(config.default_max_tokens)
            .min(config.fallback_ceiling),
        reasoning_budget: None,
    }
}
