//! Configuration loading and hot-reloading for the relaygate gateway.
//!
//! Uses figment for YAML + environment configuration with sensible defaults,
//! and notify + arc-swap for live file watching.

pub mod schema;
pub mod watcher;

pub use schema::{
    BackendConfig, BackendsSection, BudgetConfig, CacheConfig, Config, FallbackConfig, LogConfig,
    LogFormat, OAuthConfig, OAuthSection,
};
pub use watcher::ConfigWatcher;
