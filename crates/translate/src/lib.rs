//! Protocol translation between the OpenAI-compatible wire format and the
//! unified request/event representation.
//!
//! Everything here is pure: request conversion, upstream body builders,
//! upstream SSE decoders, the `StreamEvent` → SSE transform and the
//! non-streaming response builder. Transport lives in `relaygate-provider`.

pub mod anthropic;
pub mod chat;
pub mod completion;
pub mod decoder;
pub mod request;
pub mod responses;
pub mod sse;

pub use anthropic::{AnthropicDecoder, build_messages_body};
pub use chat::{ChatDecoder, build_chat_body};
pub use completion::{
    ChatCompletion, ChatCompletionChunk, CompletionMeta, CompletionUsage, ErrorBody, FinishReason,
    build_completion,
};
pub use decoder::UpstreamDecoder;
pub use request::{convert_messages, convert_request, validate};
pub use responses::{ResponsesDecoder, build_responses_body, reasoning_effort};
pub use sse::{DONE, SseTranscoder, sse_stream};
