//! Resolved model descriptors.

use crate::provider::{AuthStrategy, Backend, BackendKind};
use serde::{Deserialize, Serialize};

/// Everything the gateway needs to know about one resolved model.
///
/// Built by the router from the alias table or a pass-through id and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Name the client used (or the default public name).
    pub public_id: String,
    /// Internal `prefix/model` id.
    pub internal_id: String,
    pub backend: Backend,
    /// Model name sent upstream, with any budget suffix removed.
    pub upstream_model: String,
    /// Reasoning budget encoded as a model-name suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix_budget: Option<u32>,
    /// Reasoning budget applied when neither caller nor suffix set one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_budget: Option<u32>,
    /// Hard output-token ceiling of the backend tier.
    pub output_ceiling: u32,
}

impl ModelDescriptor {
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn auth(&self) -> AuthStrategy {
        self.backend.auth()
    }
}
