//! Anthropic Messages API: request body builder and streaming decoder.

use crate::decoder::{UpstreamDecoder, parse_arguments, parse_data, str_at};
use relaygate_types::{
    AssistantPart, BackendFinish, GenerationRequest, Message, StreamEvent, ToolChoice, Usage,
    UserPart,
};
use serde_json::{Value, json};
use std::collections::HashMap;

/// `max_tokens` used when the request carries no cap.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// `message_start` usage fields summed into the prompt token count.
const INPUT_TOKEN_FIELDS: [&str; 3] = [
    "input_tokens",
    "cache_read_input_tokens",
    "cache_creation_input_tokens",
];

/// Build a Messages API body.
///
/// Extended thinking is enabled when the request carries a reasoning budget;
/// `temperature` and `top_p` are omitted in that case since the API rejects
/// them alongside thinking.
#[must_use]
pub fn build_messages_body(model: &str, req: &GenerationRequest, stream: bool) -> Value {
    let mut out = json!({
        "model": model,
        "messages": build_messages(&req.messages),
        "max_tokens": req.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "stream": stream,
    });

    if let Some(sys) = req.system.as_deref().filter(|s| !s.is_empty()) {
        out["system"] = Value::String(sys.to_string());
    }

    if let Some(budget) = req.reasoning_budget {
        out["thinking"] = json!({"type": "enabled", "budget_tokens": budget});
    } else {
        if let Some(t) = req.temperature {
            out["temperature"] = json!(t);
        }
        if let Some(p) = req.top_p {
            out["top_p"] = json!(p);
        }
    }

    if !req.stop.is_empty() {
        out["stop_sequences"] = json!(req.stop);
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                let mut tool = json!({"name": t.name, "input_schema": t.parameters});
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
            ToolChoice::Auto => json!({"type": "auto"}),
            ToolChoice::None => json!({"type": "none"}),
            ToolChoice::Required => json!({"type": "any"}),
            ToolChoice::Function(name) => json!({"type": "tool", "name": name}),
        };
    }

    out
}

/// Convert unified messages to Messages API turns.
///
/// Tool results become `user` turns of `tool_result` blocks, and consecutive
/// turns with the same role are merged so roles alternate.
fn build_messages(messages: &[Message]) -> Vec<Value> {
    let mut out: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for m in messages {
        let (role, blocks): (&'static str, Vec<Value>) = match m {
            Message::User(parts) => ("user", parts.iter().map(user_block).collect()),
            Message::Assistant(parts) => (
                "assistant",
                parts
                    .iter()
                    .filter_map(|p| match p {
                        AssistantPart::Text { text } if text.is_empty() => None,
                        AssistantPart::Text { text } => Some(json!({"type": "text", "text": text})),
                        AssistantPart::ToolCall { id, name, input } => Some(json!({
                            "type": "tool_use",
                            "id": id,
                            "name": name,
                            "input": tool_input(input),
                        })),
                    })
                    .collect(),
            ),
            Message::Tool(results) => (
                "user",
                results
                    .iter()
                    .map(|r| {
                        json!({
                            "type": "tool_result",
                            "tool_use_id": r.tool_call_id,
                            "content": r.output,
                        })
                    })
                    .collect(),
            ),
        };
        if blocks.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some((last_role, last_blocks)) if *last_role == role => last_blocks.extend(blocks),
            _ => out.push((role, blocks)),
        }
    }

    out.into_iter()
        .map(|(role, content)| json!({"role": role, "content": content}))
        .collect()
}

fn user_block(part: &UserPart) -> Value {
    match part {
        UserPart::Text { text } => json!({"type": "text", "text": text}),
        UserPart::Image { url } => match parse_data_url(url) {
            Some((media_type, data)) => json!({
                "type": "image",
                "source": {"type": "base64", "media_type": media_type, "data": data},
            }),
            None => json!({"type": "image", "source": {"type": "url", "url": url}}),
        },
    }
}

/// Split `data:<media>;base64,<payload>`.
fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (media_type, data) = rest.split_once(";base64,")?;
    Some((media_type, data))
}

/// `tool_use.input` must be an object; raw-string arguments are wrapped.
fn tool_input(input: &Value) -> Value {
    match input {
        Value::Object(_) => input.clone(),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| json!({"input": raw})),
        Value::Null => json!({}),
        other => json!({"input": other}),
    }
}

#[derive(Debug)]
enum Block {
    Text,
    Thinking,
    Tool { id: String, name: String, json: String },
    Ignored,
}

/// Decodes Messages API SSE events.
#[derive(Debug, Default)]
pub struct AnthropicDecoder {
    blocks: HashMap<u64, Block>,
    usage: Usage,
    saw_usage: bool,
    stop_reason: Option<String>,
    finished: bool,
}

impl AnthropicDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn finish_event(&mut self) -> StreamEvent {
        self.finished = true;
        StreamEvent::Finish {
            reason: self
                .stop_reason
                .as_deref()
                .map_or(BackendFinish::Stop, BackendFinish::from_upstream),
            usage: self.saw_usage.then_some(self.usage),
        }
    }
}

impl UpstreamDecoder for AnthropicDecoder {
    fn on_event(&mut self, _event: &str, data: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let ev = match parse_data(data) {
            Ok(v) => v,
            Err(e) => return vec![e],
        };
        let index = ev.get("index").and_then(Value::as_u64).unwrap_or(0);

        match ev["type"].as_str().unwrap_or("") {
            "message_start" => {
                if let Some(u) = ev.pointer("/message/usage") {
                    self.saw_usage = true;
                    self.usage.input_tokens = INPUT_TOKEN_FIELDS
                        .iter()
                        .filter_map(|k| u.get(*k).and_then(Value::as_u64))
                        .sum();
                    self.usage.output_tokens =
                        u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
                }
                Vec::new()
            }
            "content_block_start" => {
                let block = &ev["content_block"];
                match block["type"].as_str().unwrap_or("") {
                    "text" => {
                        self.blocks.insert(index, Block::Text);
                        let text = str_at(block, "/text");
                        if text.is_empty() {
                            Vec::new()
                        } else {
                            vec![StreamEvent::text(text)]
                        }
                    }
                    "thinking" => {
                        self.blocks.insert(index, Block::Thinking);
                        Vec::new()
                    }
                    "tool_use" => {
                        let id = str_at(block, "/id").to_string();
                        let name = str_at(block, "/name").to_string();
                        self.blocks.insert(
                            index,
                            Block::Tool {
                                id: id.clone(),
                                name: name.clone(),
                                json: String::new(),
                            },
                        );
                        vec![StreamEvent::ToolInputStart { id, name }]
                    }
                    _ => {
                        self.blocks.insert(index, Block::Ignored);
                        Vec::new()
                    }
                }
            }
            "content_block_delta" => match ev.pointer("/delta/type").and_then(Value::as_str) {
                Some("text_delta") => {
                    let text = str_at(&ev, "/delta/text");
                    if text.is_empty() {
                        Vec::new()
                    } else {
                        vec![StreamEvent::text(text)]
                    }
                }
                Some("thinking_delta") => vec![StreamEvent::ReasoningDelta {
                    text: str_at(&ev, "/delta/thinking").to_string(),
                }],
                Some("input_json_delta") => {
                    let partial = str_at(&ev, "/delta/partial_json");
                    match self.blocks.get_mut(&index) {
                        Some(Block::Tool { id, json, .. }) if !partial.is_empty() => {
                            json.push_str(partial);
                            vec![StreamEvent::ToolInputDelta {
                                id: id.clone(),
                                delta: partial.to_string(),
                            }]
                        }
                        _ => Vec::new(),
                    }
                }
                _ => Vec::new(),
            },
            "content_block_stop" => match self.blocks.remove(&index) {
                Some(Block::Tool { id, name, json }) => vec![StreamEvent::ToolCall {
                    id,
                    name,
                    input: parse_arguments(&json),
                }],
                Some(Block::Text | Block::Thinking | Block::Ignored) | None => Vec::new(),
            },
            "message_delta" => {
                if let Some(reason) = ev.pointer("/delta/stop_reason").and_then(Value::as_str) {
                    self.stop_reason = Some(reason.to_string());
                }
                if let Some(out) = ev.pointer("/usage/output_tokens").and_then(Value::as_u64) {
                    self.saw_usage = true;
                    self.usage.output_tokens = out;
                }
                Vec::new()
            }
            "message_stop" => vec![self.finish_event()],
            "error" => {
                self.finished = true;
                let message = ev
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("upstream error");
                vec![StreamEvent::error(message)]
            }
            _ => Vec::new(),
        }
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished || self.stop_reason.is_none() {
            return Vec::new();
        }
        vec![self.finish_event()]
    }
}
