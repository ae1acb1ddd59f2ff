//! `OpenAI` Responses API (Codex backend): request body builder and
//! streaming decoder.
//!
//! Differences from Chat Completions:
//!
//! - the system prompt goes in the top-level `instructions` field
//! - `messages` become typed `input` items; tool calls and tool results are
//!   standalone `function_call` / `function_call_output` items
//! - the reasoning budget is expressed as an effort level

use crate::decoder::{UpstreamDecoder, parse_arguments, parse_data, str_at};
use relaygate_types::{
    AssistantPart, BackendFinish, GenerationRequest, Message, StreamEvent, ToolChoice, Usage,
    UserPart,
};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Map a reasoning budget to a Responses effort level.
#[must_use]
pub fn reasoning_effort(budget: u32) -> &'static str {
    match budget {
        0..=16_000 => "low",
        16_001..=64_000 => "medium",
        _ => "high",
    }
}

/// Build a Codex Responses body. The Codex endpoint only accepts streaming,
/// unstored requests.
#[must_use]
pub fn build_responses_body(model: &str, req: &GenerationRequest) -> Value {
    let mut out = json!({
        "model": model,
        "instructions": req.system.clone().unwrap_or_default(),
        "input": build_input(&req.messages),
        "store": false,
        "stream": true,
        "parallel_tool_calls": true,
    });

    if let Some(budget) = req.reasoning_budget {
        out["reasoning"] = json!({"effort": reasoning_effort(budget), "summary": "auto"});
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                let mut name = t.name.clone();
                if name.len() > 64 {
                    name.truncate(64);
                }
                let mut tool = json!({
                    "type": "function",
                    "name": name,
                    "parameters": t.parameters,
                });
                if let Some(desc) = &t.description {
                    tool["description"] = Value::String(desc.clone());
                }
                tool
            })
            .collect();
        out["tools"] = Value::Array(tools);
    }

    if let Some(choice) = &req.tool_choice {
        out["tool_choice"] = match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Function(name) => json!({"type": "function", "name": name}),
        };
    }

    out
}

fn build_input(messages: &[Message]) -> Vec<Value> {
    let mut input = Vec::new();
    for m in messages {
        match m {
            Message::User(parts) => {
                let content: Vec<Value> = parts
                    .iter()
                    .map(|p| match p {
                        UserPart::Text { text } => json!({"type": "input_text", "text": text}),
                        UserPart::Image { url } => json!({"type": "input_image", "image_url": url}),
                    })
                    .collect();
                input.push(json!({"type": "message", "role": "user", "content": content}));
            }
            Message::Assistant(parts) => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| match p {
                        AssistantPart::Text { text } => Some(text.as_str()),
                        AssistantPart::ToolCall { .. } => None,
                    })
                    .collect();
                if !text.is_empty() {
                    input.push(json!({
                        "type": "message",
                        "role": "assistant",
                        "content": [{"type": "output_text", "text": text}],
                    }));
                }
                for p in parts {
                    if let AssistantPart::ToolCall { id, name, input: args } = p {
                        input.push(json!({
                            "type": "function_call",
                            "call_id": id,
                            "name": name,
                            "arguments": AssistantPart::arguments_string(args),
                        }));
                    }
                }
            }
            Message::Tool(results) => {
                for r in results {
                    input.push(json!({
                        "type": "function_call_output",
                        "call_id": r.tool_call_id,
                        "output": r.output,
                    }));
                }
            }
        }
    }
    input
}

#[derive(Debug)]
struct PendingCall {
    call_id: String,
    name: String,
    arguments: String,
}

/// Decodes Responses API SSE events.
#[derive(Debug, Default)]
pub struct ResponsesDecoder {
    /// Function calls in progress, keyed by output item id.
    calls: HashMap<String, PendingCall>,
    saw_tool_call: bool,
    finished: bool,
}

impl ResponsesDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn completed(&mut self, response: &Value, fallback: BackendFinish) -> StreamEvent {
        self.finished = true;
        let usage = response.get("usage").filter(|u| u.is_object()).map(|u| Usage {
            input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
        });
        let reason = match response
            .pointer("/incomplete_details/reason")
            .and_then(Value::as_str)
        {
            Some(r) => BackendFinish::from_upstream(r),
            None if self.saw_tool_call => BackendFinish::ToolCalls,
            None => fallback,
        };
        StreamEvent::Finish { reason, usage }
    }
}

impl UpstreamDecoder for ResponsesDecoder {
    fn on_event(&mut self, event: &str, data: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let ev = match parse_data(data) {
            Ok(v) => v,
            Err(e) => return vec![e],
        };
        let kind = ev
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or(event)
            .to_string();

        match kind.as_str() {
            "response.output_text.delta" => {
                let delta = str_at(&ev, "/delta");
                if delta.is_empty() {
                    Vec::new()
                } else {
                    vec![StreamEvent::text(delta)]
                }
            }
            "response.reasoning_summary_text.delta" => vec![StreamEvent::ReasoningDelta {
                text: str_at(&ev, "/delta").to_string(),
            }],
            "response.output_item.added"
                if ev.pointer("/item/type").and_then(Value::as_str) == Some("function_call") =>
            {
                let item_id = str_at(&ev, "/item/id").to_string();
                let call_id = str_at(&ev, "/item/call_id").to_string();
                let name = str_at(&ev, "/item/name").to_string();
                self.saw_tool_call = true;
                self.calls.insert(
                    item_id,
                    PendingCall {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        arguments: String::new(),
                    },
                );
                vec![StreamEvent::ToolInputStart { id: call_id, name }]
            }
            "response.function_call_arguments.delta" => {
                let delta = str_at(&ev, "/delta");
                match self.calls.get_mut(str_at(&ev, "/item_id")) {
                    Some(call) if !delta.is_empty() => {
                        call.arguments.push_str(delta);
                        vec![StreamEvent::ToolInputDelta {
                            id: call.call_id.clone(),
                            delta: delta.to_string(),
                        }]
                    }
                    _ => Vec::new(),
                }
            }
            "response.output_item.done"
                if ev.pointer("/item/type").and_then(Value::as_str) == Some("function_call") =>
            {
                let item = &ev["item"];
                let pending = self.calls.remove(str_at(item, "/id"));
                let call_id = pending
                    .as_ref()
                    .map_or_else(|| str_at(item, "/call_id").to_string(), |p| p.call_id.clone());
                let name = pending
                    .as_ref()
                    .map_or_else(|| str_at(item, "/name").to_string(), |p| p.name.clone());
                let arguments = item
                    .get("arguments")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| pending.map(|p| p.arguments))
                    .unwrap_or_default();
                self.saw_tool_call = true;
                vec![StreamEvent::ToolCall {
                    id: call_id,
                    name,
                    input: parse_arguments(&arguments),
                }]
            }
            "response.completed" => vec![self.completed(&ev["response"], BackendFinish::Stop)],
            "response.incomplete" => {
                vec![self.completed(&ev["response"], BackendFinish::Length)]
            }
            "response.failed" => {
                self.finished = true;
                let message = ev
                    .pointer("/response/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("response failed");
                vec![StreamEvent::error(message)]
            }
            "error" => {
                self.finished = true;
                let message = ev
                    .get("message")
                    .or_else(|| ev.pointer("/error/message"))
                    .and_then(Value::as_str)
                    .unwrap_or("upstream error");
                vec![StreamEvent::error(message)]
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }
}
