//! OAuth access-token management for the consumer-plan providers.
//!
//! Each provider module holds its static [`OAuthProfile`]. The
//! [`OAuthTokenManager`] coordinates cache lookups, deduplicated refreshes and
//! refresh-token rotation across providers.

pub mod claude;
pub mod codex;
pub mod endpoint;
pub mod jwt;
pub mod manager;
pub mod profile;

pub use endpoint::HttpTokenEndpoint;
pub use manager::OAuthTokenManager;
pub use profile::{OAuthProfile, profile};
