//! OpenAI-compatible response records and the non-streaming response builder.

use relaygate_types::{AssistantPart, BackendFinish, Generation, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outward `finish_reason` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl FinishReason {
    /// Map a backend finish reason.
    ///
    /// `tool_calls` is reported if and only if tool calls were emitted and no
    /// text followed them, whatever the backend said.
    #[must_use]
    pub fn from_backend(reason: &BackendFinish, tool_calls_pending: bool) -> Self {
        if tool_calls_pending {
            return Self::ToolCalls;
        }
        match reason {
            BackendFinish::Length | BackendFinish::MaxTokens => Self::Length,
            BackendFinish::ContentFilter => Self::ContentFilter,
            BackendFinish::Stop
            | BackendFinish::EndTurn
            | BackendFinish::ToolCalls
            | BackendFinish::Other(_) => Self::Stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl From<Usage> for CompletionUsage {
    fn from(u: Usage) -> Self {
        Self {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

impl ToolCall {
    #[must_use]
    pub fn function(id: String, name: String, input: &Value) -> Self {
        Self {
            id,
            kind: "function".to_string(),
            function: FunctionCall {
                name,
                arguments: AssistantPart::arguments_string(input),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: FinishReason,
}

/// A `chat.completion` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

/// Per-response identity shared by every record of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionMeta {
    pub id: String,
    pub created: u64,
    pub model: String,
}

impl CompletionMeta {
    /// Fresh `chatcmpl-<uuid>` id stamped with the current time.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            created: relaygate_types::token::now_secs(),
            model: model.into(),
        }
    }
}

/// Build a `chat.completion` from a collected generation.
#[must_use]
pub fn build_completion(meta: &CompletionMeta, generation: Generation) -> ChatCompletion {
    let pending = !generation.tool_calls.is_empty() && !generation.text_after_tool_calls;
    let finish_reason = FinishReason::from_backend(&generation.finish, pending);
    let tool_calls = (!generation.tool_calls.is_empty()).then(|| {
        generation
            .tool_calls
            .into_iter()
            .map(|c| ToolCall::function(c.id, c.name, &c.input))
            .collect()
    });
    let content = (!generation.text.is_empty()).then_some(generation.text);
    ChatCompletion {
        id: meta.id.clone(),
        object: "chat.completion".to_string(),
        created: meta.created,
        model: meta.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content,
                tool_calls,
            },
            finish_reason,
        }],
        usage: generation.usage.map(CompletionUsage::from),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub function: FunctionDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<FinishReason>,
}

/// A `chat.completion.chunk` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

impl ChatCompletionChunk {
    #[must_use]
    pub fn new(meta: &CompletionMeta, delta: Delta, finish_reason: Option<FinishReason>) -> Self {
        Self {
            id: meta.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: meta.created,
            model: meta.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage: None,
        }
    }
}

/// OpenAI-shaped error object, used both in HTTP error bodies and in-stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: Option<String>,
    pub param: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>, kind: &str, code: Option<&str>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                kind: kind.to_string(),
                code: code.map(str::to_string),
                param: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_types::GeneratedToolCall;
    use serde_json::json;

    fn meta() -> CompletionMeta {
        CompletionMeta {
            id: "chatcmpl-test".into(),
            created: 1_700_000_000,
            model: "claude-opus".into(),
        }
    }

    #[test]
    fn test_finish_mapping() {
        let f = |r: BackendFinish| FinishReason::from_backend(&r, false);
        assert_eq!(f(BackendFinish::Stop), FinishReason::Stop);
        assert_eq!(f(BackendFinish::EndTurn), FinishReason::Stop);
        assert_eq!(f(BackendFinish::Length), FinishReason::Length);
        assert_eq!(f(BackendFinish::MaxTokens), FinishReason::Length);
        assert_eq!(f(BackendFinish::ContentFilter), FinishReason::ContentFilter);
        assert_eq!(f(BackendFinish::Other("weird".into())), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_backend(&BackendFinish::EndTurn, true),
            FinishReason::ToolCalls
        );
    }

    #[test]
    fn test_backend_tool_calls_without_calls_is_stop() {
        assert_eq!(
            FinishReason::from_backend(&BackendFinish::ToolCalls, false),
            FinishReason::Stop
        );
    }

    #[test]
    fn test_build_completion_text() {
        let g = Generation {
            text: "4".into(),
            usage: Some(Usage {
                input_tokens: 10,
                output_tokens: 1,
            }),
            finish: BackendFinish::EndTurn,
            ..Generation::default()
        };
        let c = build_completion(&meta(), g);
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["object"], "chat.completion");
        assert_eq!(v["model"], "claude-opus");
        assert_eq!(v["choices"][0]["message"]["role"], "assistant");
        assert_eq!(v["choices"][0]["message"]["content"], "4");
        assert!(v["choices"][0]["message"].get("tool_calls").is_none());
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
        assert_eq!(v["usage"]["total_tokens"], 11);
    }

    #[test]
    fn test_build_completion_tool_calls() {
        let g = Generation {
            tool_calls: vec![
                GeneratedToolCall {
                    id: "c1".into(),
                    name: "weather".into(),
                    input: json!({"city": "Paris"}),
                },
                GeneratedToolCall {
                    id: "c2".into(),
                    name: "raw".into(),
                    input: json!("{broken"),
                },
            ],
            finish: BackendFinish::ToolCalls,
            ..Generation::default()
        };
        let v = serde_json::to_value(build_completion(&meta(), g)).unwrap();
        let msg = &v["choices"][0]["message"];
        assert!(msg["content"].is_null());
        assert_eq!(msg["tool_calls"][0]["type"], "function");
        assert_eq!(
            msg["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );
        assert_eq!(msg["tool_calls"][1]["function"]["arguments"], "{broken");
        assert_eq!(v["choices"][0]["finish_reason"], "tool_calls");
        assert!(v.get("usage").is_none());
    }

    #[test]
    fn test_text_after_tools_is_not_tool_calls() {
        let g = Generation {
            text: "done".into(),
            tool_calls: vec![GeneratedToolCall {
                id: "c1".into(),
                name: "f".into(),
                input: json!({}),
            }],
            text_after_tool_calls: true,
            finish: BackendFinish::EndTurn,
            ..Generation::default()
        };
        let c = build_completion(&meta(), g);
        assert_eq!(c.choices[0].finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_meta_id_prefix() {
        let m = CompletionMeta::new("x");
        assert!(m.id.starts_with("chatcmpl-"));
        assert!(m.created > 1_600_000_000);
    }

    #[test]
    fn test_error_body_shape() {
        let v = serde_json::to_value(ErrorBody::new("boom", "server_error", Some("internal_error")))
            .unwrap();
        assert_eq!(
            v,
            json!({"error": {"message": "boom", "type": "server_error",
                "code": "internal_error", "param": null}})
        );
    }
}
