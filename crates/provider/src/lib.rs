//! Model routing, budget resolution, backends and the gateway orchestrator.
//!
//! Each backend module implements [`ModelBackend`](relaygate_types::ModelBackend)
//! for one upstream wire protocol. [`HttpBackends`] builds them from a
//! configuration snapshot and [`Gateway`] drives a request through routing,
//! credentials, invocation and the fallback policy.

pub mod anthropic;
pub mod backends;
pub mod budget;
pub mod codex;
pub mod gateway;
pub mod http_util;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicBackend;
pub use backends::{BackendResolver, HttpBackends};
pub use budget::{Budget, fallback_budget, resolve_budget};
pub use codex::CodexBackend;
pub use gateway::{Gateway, GatewayResponse, Reply, ServedBy, SseStream};
pub use http_util::ProviderHttp;
pub use openai_compat::OpenAICompatBackend;
pub use router::{ModelEntry, ModelList, ModelRouter, Resolution};
