//! Provider-neutral request representation.
//!
//! Every backend builds its upstream body from a [`GenerationRequest`]; the
//! `OpenAI` wire request is converted into this shape exactly once per call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single generation request in unified form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// All system/developer texts joined by a blank line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Output token cap. `None` until budgets have been resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Extended-reasoning budget in tokens. `None` disables reasoning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_budget: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", content = "parts", rename_all = "snake_case")]
pub enum Message {
    User(Vec<UserPart>),
    Assistant(Vec<AssistantPart>),
    Tool(Vec<ToolResult>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserPart {
    Text { text: String },
    Image { url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantPart {
    Text {
        text: String,
    },
    /// A tool invocation. `input` is the parsed arguments object, or a JSON
    /// string holding the raw arguments when they were not valid JSON.
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
}

/// The output of one tool call, matched back to its call by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    /// Name recorded for `tool_call_id`, or [`UNKNOWN_TOOL_NAME`].
    pub tool_name: String,
    pub output: String,
}

/// Tool name used for results whose call id never appeared in the history.
pub const UNKNOWN_TOOL_NAME: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

impl Message {
    /// Convenience constructor for a plain-text user turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::User(vec![UserPart::Text { text: text.into() }])
    }

    /// Convenience constructor for a plain-text assistant turn.
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::Assistant(vec![AssistantPart::Text { text: text.into() }])
    }
}

impl AssistantPart {
    /// Tool-call arguments as the JSON string form `OpenAI`-style APIs expect.
    #[must_use]
    pub fn arguments_string(input: &Value) -> String {
        match input {
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_string_object() {
        let s = AssistantPart::arguments_string(&json!({"x": 1}));
        assert_eq!(s, r#"{"x":1}"#);
    }

    #[test]
    fn test_arguments_string_raw_passthrough() {
        let s = AssistantPart::arguments_string(&json!("{not json"));
        assert_eq!(s, "{not json");
    }

    #[test]
    fn test_message_serde_shape() {
        let v = serde_json::to_value(Message::user_text("hi")).unwrap();
        assert_eq!(v["role"], "user");
        assert_eq!(v["parts"][0]["type"], "text");
        assert_eq!(v["parts"][0]["text"], "hi");
    }

    #[test]
    fn test_default_request_is_empty() {
        let r = GenerationRequest::default();
        assert!(r.messages.is_empty());
        assert!(r.reasoning_budget.is_none());
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("tools").is_none());
    }
}
