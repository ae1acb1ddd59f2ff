//! Strongly-typed OpenAI-compatible chat completion request.
//!
//! Common fields are typed; anything else a client sends is kept in a
//! catch-all map so unknown parameters never fail deserialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// An OpenAI-compatible `/chat/completions` request body.
///
/// `messages` is optional at this level so that a missing list surfaces as an
/// `InvalidRequest` from validation instead of a generic parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<WireMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<WireTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// A single stop string or an array of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Value>,
    /// Explicit extended-reasoning budget in tokens.
    #[serde(
        default,
        alias = "thinking_budget",
        skip_serializing_if = "Option::is_none"
    )]
    pub reasoning_budget: Option<u32>,
    /// All remaining fields not captured above.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ChatCompletionRequest {
    #[must_use]
    pub fn is_stream(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// Caller-supplied output cap; `max_completion_tokens` wins over `max_tokens`.
    #[must_use]
    pub fn caller_max_tokens(&self) -> Option<u32> {
        self.max_completion_tokens.or(self.max_tokens)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    Developer,
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Unknown,
}

/// One message of the wire conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<WireContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Message content: a plain string, a list of typed parts, or (for tool
/// results) an arbitrary JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<Value>),
    Other(Value),
}

impl WireContent {
    /// Concatenate all text carried by this content.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(""),
            Self::Other(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionCall {
    #[serde(default)]
    pub name: String,
    /// Usually a JSON-encoded string; some clients send an object.
    #[serde(default)]
    pub arguments: Value,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTool {
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: WireFunctionDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFunctionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

fn function_type() -> String {
    "function".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_minimal() {
        let v = json!({
            "messages": [{"role": "user", "content": "hi"}]
        });
        let req: ChatCompletionRequest = serde_json::from_value(v).unwrap();
        assert!(req.model.is_none());
        assert!(!req.is_stream());
        assert_eq!(req.messages.as_ref().unwrap().len(), 1);
        assert!(req.extra.is_empty());
    }

    #[test]
    fn test_missing_messages_is_none() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({"model": "x"})).unwrap();
        assert!(req.messages.is_none());
    }

    #[test]
    fn test_extra_fields_preserved() {
        let v = json!({
            "model": "claude-opus",
            "messages": [],
            "presence_penalty": 0.5,
            "user": "u1"
        });
        let req: ChatCompletionRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.extra.get("presence_penalty"), Some(&json!(0.5)));
        assert_eq!(req.extra.get("user"), Some(&json!("u1")));
    }

    #[test]
    fn test_caller_max_tokens_precedence() {
        let req = ChatCompletionRequest {
            max_tokens: Some(100),
            max_completion_tokens: Some(200),
            ..Default::default()
        };
        assert_eq!(req.caller_max_tokens(), Some(200));
        let req = ChatCompletionRequest {
            max_tokens: Some(100),
            ..Default::default()
        };
        assert_eq!(req.caller_max_tokens(), Some(100));
    }

    #[test]
    fn test_thinking_budget_alias() {
        let req: ChatCompletionRequest =
            serde_json::from_value(json!({"messages": [], "thinking_budget": 5000})).unwrap();
        assert_eq!(req.reasoning_budget, Some(5000));
    }

    #[test]
    fn test_unknown_role_and_parts() {
        let v = json!({
            "messages": [
                {"role": "function", "content": "x"},
                {"role": "user", "content": [
                    {"type": "text", "text": "a"},
                    {"type": "image_url", "image_url": {"url": "https://x/y.png"}},
                    {"type": "text", "text": "b"}
                ]}
            ]
        });
        let req: ChatCompletionRequest = serde_json::from_value(v).unwrap();
        let msgs = req.messages.unwrap();
        assert_eq!(msgs[0].role, Role::Unknown);
        assert_eq!(msgs[1].content.as_ref().unwrap().text(), "ab");
    }

    #[test]
    fn test_tool_call_arguments_string() {
        let v = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{"id": "c1", "type": "function",
                "function": {"name": "f", "arguments": "{\"a\":1}"}}]
        });
        let m: WireMessage = serde_json::from_value(v).unwrap();
        assert!(m.content.is_none());
        let call = &m.tool_calls.unwrap()[0];
        assert_eq!(call.function.arguments, json!("{\"a\":1}"));
        assert_eq!(call.kind, "function");
    }
}
