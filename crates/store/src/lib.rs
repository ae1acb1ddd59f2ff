//! Credential cache backends.
//!
//! Provides an in-memory store for tests and single-process use, and an
//! Upstash Redis REST store for deployments that share tokens across processes.

pub mod memory;
pub mod upstash;

pub use memory::InMemoryCredentialStore;
pub use upstash::UpstashCredentialStore;
