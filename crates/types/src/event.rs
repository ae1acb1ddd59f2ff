//! Unified streaming events produced by every backend.

use crate::{GatewayError, Result};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One unit of backend output, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    TextDelta {
        text: String,
    },
    /// Reasoning text. Not forwarded to `OpenAI` clients.
    ReasoningDelta {
        text: String,
    },
    ToolInputStart {
        id: String,
        name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    /// A complete tool call, emitted by non-incremental backends or as the
    /// closing event after incremental input.
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    Finish {
        reason: BackendFinish,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}

/// Finish reason as reported by the backend, before mapping to `OpenAI`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendFinish {
    Stop,
    EndTurn,
    ToolCalls,
    Length,
    MaxTokens,
    ContentFilter,
    Other(String),
}

impl BackendFinish {
    /// Parse the finish/stop reason strings used by the supported upstreams.
    #[must_use]
    pub fn from_upstream(raw: &str) -> Self {
        match raw {
            "stop" | "stop_sequence" | "completed" => Self::Stop,
            "end_turn" | "end-turn" => Self::EndTurn,
            "tool_calls" | "tool-calls" | "tool_use" | "function_call" => Self::ToolCalls,
            "length" => Self::Length,
            "max_tokens" | "max-tokens" | "max_output_tokens" => Self::MaxTokens,
            "content_filter" | "content-filter" | "refusal" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Token accounting for one generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A tool call in a completed generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A fully collected, non-streaming generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub tool_calls: Vec<GeneratedToolCall>,
    pub finish: BackendFinish,
    pub usage: Option<Usage>,
    /// `true` when any text arrived after the first tool call.
    pub text_after_tool_calls: bool,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            text: String::new(),
            tool_calls: Vec::new(),
            finish: BackendFinish::Stop,
            usage: None,
            text_after_tool_calls: false,
        }
    }
}

impl Generation {
    /// Drain an event stream into a single generation.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stream`] if the stream carries an error event.
    pub async fn collect<S>(stream: S) -> Result<Self>
    where
        S: Stream<Item = StreamEvent> + Send,
    {
        let mut stream = std::pin::pin!(stream);
        let mut collector = GenerationCollector::default();
        while let Some(event) = stream.next().await {
            collector.push(event)?;
        }
        Ok(collector.finish())
    }
}

/// Incremental builder behind [`Generation::collect`].
#[derive(Debug, Default)]
pub struct GenerationCollector {
    generation: Generation,
    /// Tool calls assembled from start/delta events, by id.
    partial: Vec<(String, String, String)>,
}

impl GenerationCollector {
    /// Apply one event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Stream`] for [`StreamEvent::Error`].
    pub fn push(&mut self, event: StreamEvent) -> Result<()> {
        let g = &mut self.generation;
        match event {
            StreamEvent::TextDelta { text } if text.is_empty() => {}
            StreamEvent::TextDelta { text } => {
                if !g.tool_calls.is_empty() || !self.partial.is_empty() {
                    g.text_after_tool_calls = true;
                }
                g.text.push_str(&text);
            }
            StreamEvent::ReasoningDelta { .. } => {}
            StreamEvent::ToolInputStart { id, name } => {
                self.partial.push((id, name, String::new()));
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                if let Some(entry) = self.partial.iter_mut().find(|(pid, _, _)| *pid == id) {
                    entry.2.push_str(&delta);
                }
            }
            StreamEvent::ToolCall { id, name, input } => {
                self.partial.retain(|(pid, _, _)| *pid != id);
                if !g.tool_calls.iter().any(|c| c.id == id) {
                    g.tool_calls.push(GeneratedToolCall { id, name, input });
                }
            }
            StreamEvent::Finish { reason, usage } => {
                g.finish = reason;
                if usage.is_some() {
                    g.usage = usage;
                }
            }
            StreamEvent::Error { message } => return Err(GatewayError::Stream(message)),
        }
        Ok(())
    }

    /// Close the collector, completing any calls that never got a final event.
    #[must_use]
    pub fn finish(mut self) -> Generation {
        for (id, name, raw) in self.partial.drain(..) {
            let input = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            self.generation
                .tool_calls
                .push(GeneratedToolCall { id, name, input });
        }
        self.generation
    }
}
