//! Converts an OpenAI-compatible chat request into a [`GenerationRequest`].
//!
//! Validation happens here, before any backend is chosen: an empty or missing
//! message list and `n > 1` are rejected as `InvalidRequest`.

use relaygate_types::{
    AssistantPart, ChatCompletionRequest, GatewayError, GenerationRequest, Message, Result, Role,
    ToolChoice, ToolDefinition, ToolResult, UserPart, WireContent, WireMessage,
    unified::UNKNOWN_TOOL_NAME,
};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Reject requests the gateway cannot serve.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a missing or empty `messages`
/// list, or for `n > 1`.
pub fn validate(req: &ChatCompletionRequest) -> Result<&[WireMessage]> {
    let messages = match req.messages.as_deref() {
        Some(m) if !m.is_empty() => m,
        _ => {
            return Err(GatewayError::invalid_request(
                "messages is required and must be a non-empty array.",
            ));
        }
    };
    if req.n.is_some_and(|n| n > 1) {
        return Err(GatewayError::InvalidRequest {
            message: "n > 1 is not supported. Only a single completion can be generated."
                .to_string(),
            code: Some("unsupported_parameter"),
        });
    }
    Ok(messages)
}

/// Validate and convert a wire request.
///
/// Budgets are left unset except for the caller's explicit values; the
/// orchestrator resolves the final numbers.
///
/// # Errors
///
/// See [`validate`].
pub fn convert_request(req: &ChatCompletionRequest) -> Result<GenerationRequest> {
    let messages = validate(req)?;
    let (system, messages) = convert_messages(messages);
    Ok(GenerationRequest {
        system,
        messages,
        tools: convert_tools(req),
        tool_choice: req.tool_choice.as_ref().and_then(convert_tool_choice),
        max_output_tokens: req.caller_max_tokens(),
        reasoning_budget: req.reasoning_budget,
        temperature: req.temperature,
        top_p: req.top_p,
        stop: convert_stop(req.stop.as_ref()),
    })
}

/// Split wire messages into the joined system text and the conversation.
#[must_use]
pub fn convert_messages(messages: &[WireMessage]) -> (Option<String>, Vec<Message>) {
    let mut system_parts: Vec<String> = Vec::new();
    let mut out: Vec<Message> = Vec::new();
    let mut tool_names: HashMap<String, String> = HashMap::new();

    for m in messages {
        match m.role {
            Role::System | Role::Developer => match &m.content {
                Some(WireContent::Text(s)) => system_parts.push(s.clone()),
                Some(WireContent::Parts(parts)) => {
                    system_parts.extend(parts.iter().filter_map(text_part));
                }
                Some(WireContent::Other(_)) | None => {}
            },
            Role::User => match &m.content {
                Some(WireContent::Text(s)) => out.push(Message::user_text(s.clone())),
                Some(WireContent::Parts(parts)) => {
                    out.push(Message::User(parts.iter().filter_map(user_part).collect()));
                }
                Some(WireContent::Other(_)) | None => {}
            },
            Role::Assistant => out.push(convert_assistant(m, &mut tool_names)),
            Role::Tool => {
                let tool_call_id = m
                    .tool_call_id
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string());
                let tool_name = tool_names
                    .get(&tool_call_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string());
                if tool_name == UNKNOWN_TOOL_NAME {
                    tracing::debug!(tool_call_id, "tool result for unseen call id");
                }
                let output = match &m.content {
                    Some(WireContent::Text(s)) => s.clone(),
                    Some(WireContent::Parts(parts)) => Value::Array(parts.clone()).to_string(),
                    Some(WireContent::Other(v)) => v.to_string(),
                    None => String::new(),
                };
                out.push(Message::Tool(vec![ToolResult {
                    tool_call_id,
                    tool_name,
                    output,
                }]));
            }
            Role::Unknown => {}
        }
    }

    let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
    (system, out)
}

fn text_part(part: &Value) -> Option<String> {
    if part.get("type").and_then(Value::as_str) == Some("text") {
        part.get("text").and_then(Value::as_str).map(str::to_string)
    } else {
        None
    }
}

fn user_part(part: &Value) -> Option<UserPart> {
    match part.get("type").and_then(Value::as_str)? {
        "text" => Some(UserPart::Text {
            text: part.get("text").and_then(Value::as_str)?.to_string(),
        }),
        "image_url" => {
            let url = part
                .pointer("/image_url/url")
                .or_else(|| part.get("image_url"))
                .and_then(Value::as_str)?;
            Some(UserPart::Image {
                url: url.to_string(),
            })
        }
        _ => None,
    }
}

fn convert_assistant(m: &WireMessage, tool_names: &mut HashMap<String, String>) -> Message {
    let text = m.content.as_ref().map(WireContent::text).unwrap_or_default();
    let calls = m.tool_calls.as_deref().unwrap_or_default();
    if calls.is_empty() {
        return Message::assistant_text(text);
    }

    let mut parts = Vec::with_capacity(calls.len() + 1);
    if !text.is_empty() {
        parts.push(AssistantPart::Text { text });
    }
    for (i, call) in calls.iter().enumerate() {
        let id = call.id.clone().unwrap_or_else(|| format!("call_{i}"));
        tool_names.insert(id.clone(), call.function.name.clone());
        let input = match &call.function.arguments {
            Value::String(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            Value::Null => json!({}),
            other => other.clone(),
        };
        parts.push(AssistantPart::ToolCall {
            id,
            name: call.function.name.clone(),
            input,
        });
    }
    Message::Assistant(parts)
}

fn convert_tools(req: &ChatCompletionRequest) -> Vec<ToolDefinition> {
    req.tools
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|t| t.kind == "function")
        .map(|t| ToolDefinition {
            name: t.function.name.clone(),
            description: t.function.description.clone(),
            parameters: t
                .function
                .parameters
                .clone()
                .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
        })
        .collect()
}

/// `none | auto | required | {type: function, function: {name}}`; anything
/// else is ignored.
#[must_use]
pub fn convert_tool_choice(choice: &Value) -> Option<ToolChoice> {
    match choice {
        Value::String(s) => match s.as_str() {
            "none" => Some(ToolChoice::None),
            "auto" => Some(ToolChoice::Auto),
            "required" => Some(ToolChoice::Required),
            _ => None,
        },
        Value::Object(_) if choice.get("type").and_then(Value::as_str) == Some("function") => {
            choice
                .pointer("/function/name")
                .and_then(Value::as_str)
                .map(|n| ToolChoice::Function(n.to_string()))
        }
        _ => None,
    }
}

fn convert_stop(stop: Option<&Value>) -> Vec<String> {
    match stop {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
