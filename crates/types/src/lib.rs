//! Core types and traits for the relaygate workspace.
//!
//! This crate defines the shared abstractions used across all layers of the
//! gateway: the error taxonomy, provider and backend identifiers, the wire
//! request, the unified request and event representation, and the async
//! traits each layer implements.

pub mod chat;
pub mod error;
pub mod event;
pub mod model;
pub mod provider;
pub mod token;
pub mod traits;
pub mod unified;

pub use chat::{ChatCompletionRequest, Role, WireContent, WireMessage, WireTool, WireToolCall};
pub use error::{GatewayError, Result};
pub use event::{BackendFinish, GeneratedToolCall, Generation, StreamEvent, Usage};
pub use model::ModelDescriptor;
pub use provider::{AuthStrategy, Backend, BackendKind, ProtocolFormat, ProviderId};
pub use token::{AccessGrant, EXPIRY_BUFFER, TokenGrant};
pub use traits::{
    BackendCall, ByteStream, CredentialStore, EventStream, ModelBackend, RefreshRequest,
    TokenEndpoint,
};
pub use unified::{
    AssistantPart, GenerationRequest, Message, ToolChoice, ToolDefinition, ToolResult, UserPart,
};
