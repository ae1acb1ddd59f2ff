//! Upstream OpenAI-compatible Chat Completions: request body builder and
//! streaming decoder. Used by the multi-vendor gateway and every direct
//! vendor that speaks this protocol.

use crate::decoder::{UpstreamDecoder, parse_arguments, parse_data, str_at};
use relaygate_types::{
    AssistantPart, BackendFinish, GenerationRequest, Message, StreamEvent, ToolChoice, Usage,
    UserPart,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Build a streaming Chat Completions body for an upstream vendor.
#[must_use]
pub fn build_chat_body(model: &str, req: &GenerationRequest) -> Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if let Some(sys) = req.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(json!({"role": "system", "content": sys}));
    }
    for m in &req.messages {
        match m {
            Message::User(parts) => {
                let content = match parts.as_slice() {
                    [UserPart::Text { text }] => json!(text),
                    _ => Value::Array(
                        parts
                            .iter()
                            .map(|p| match p {
                                UserPart::Text { text } => json!({"type": "text", "text": text}),
                                UserPart::Image { url } => {
                                    json!({"type": "image_url", "image_url": {"url": url}})
                                }
                            })
                            .collect(),
                    ),
                };
                messages.push(json!({"role": "user", "content": content}));
            }
            Message::Assistant(parts) => {
                let text: String = parts
                    .iter()
                    .filter_map(|p| match p {
                        AssistantPart::Text { text } => Some(text.as_str()),
                        AssistantPart::ToolCall { .. } => None,
                    })
                    .collect();
                let calls: Vec<Value> = parts
                    .iter()
                    .filter_map(|p| match p {
                        AssistantPart::ToolCall { id, name, input } => Some(json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": AssistantPart::arguments_string(input)},
                        })),
                        AssistantPart::Text { .. } => None,
                    })
                    .collect();
                let mut msg = json!({"role": "assistant", "content": text});
                if !calls.is_empty() {
                    msg["tool_calls"] = Value::Array(calls);
                    if text.is_empty() {
                        msg["content"] = Value::Null;
                    }
                }
                messages.push(msg);
            }
            Message::Tool(results) => {
                for r in results {
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": r.tool_call_id,
                        "content": r.output,
                    }));
                }
            }
        }
    }

    let mut out = json!({
        "model": model,
        "messages": messages,
        "stream": true,
        "stream_options": {"include_usage": true},
    });
    if let Some(max) = req.max_output_tokens {
        out["max_tokens"] = json!(max);
    }
    if let Some(t) = req.temperature {
        out["temperature"] = json!(t);
    }
    if let Some(p) = req.top_p {
        out["top_p"] = json!(p);
    }
    if !req.stop.is_empty() {
        out["stop"] = json!(req.stop);
    }
    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                let mut function = json!({"name": t.name, "parameters": t.parameters});
                if let Some(desc) = &t.description {
                    function["description"] = Value::String(desc.clone());
                }
                json!({"type": "function", "function": function})
            })
            .collect();
        out["tools"] = Value::Array(tools);
    }
    if let Some(choice) = &req.tool_choice {
        out["tool_choice"] = match choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Required => json!("required"),
            ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
        };
    }
    out
}

#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    arguments: String,
}

/// Decodes upstream `chat.completion.chunk` events.
///
/// Tool call fragments are keyed by the upstream `index`; complete
/// [`StreamEvent::ToolCall`]s are emitted when the choice finishes.
#[derive(Debug, Default)]
pub struct ChatDecoder {
    calls: BTreeMap<u64, PendingCall>,
    reason: Option<BackendFinish>,
    usage: Option<Usage>,
    finished: bool,
}

impl ChatDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_calls(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.calls)
            .into_values()
            .map(|c| StreamEvent::ToolCall {
                id: c.id,
                name: c.name,
                input: parse_arguments(&c.arguments),
            })
            .collect()
    }

    fn terminate(&mut self) -> Vec<StreamEvent> {
        self.finished = true;
        let mut out = self.flush_calls();
        out.push(StreamEvent::Finish {
            reason: self.reason.take().unwrap_or(BackendFinish::Stop),
            usage: self.usage,
        });
        out
    }
}

impl UpstreamDecoder for ChatDecoder {
    fn on_event(&mut self, _event: &str, data: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        if data.trim() == "[DONE]" {
            return self.terminate();
        }
        let ev = match parse_data(data) {
            Ok(v) => v,
            Err(e) => return vec![e],
        };
        if let Some(err) = ev.get("error") {
            self.finished = true;
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("upstream error");
            return vec![StreamEvent::error(message)];
        }
        if let Some(u) = ev.get("usage").filter(|u| u.is_object()) {
            self.usage = Some(Usage {
                input_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                output_tokens: u.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
            });
        }

        let mut out = Vec::new();
        let Some(choice) = ev.pointer("/choices/0") else {
            return out;
        };
        let delta = &choice["delta"];

        for key in ["reasoning_content", "reasoning"] {
            if let Some(r) = delta.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) {
                out.push(StreamEvent::ReasoningDelta { text: r.to_string() });
            }
        }
        if let Some(text) = delta.get("content").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            out.push(StreamEvent::text(text));
        }
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for tc in calls {
                let index = tc.get("index").and_then(Value::as_u64).unwrap_or(0);
                let fragment = str_at(tc, "/function/arguments");
                if let Some(call) = self.calls.get_mut(&index) {
                    if !fragment.is_empty() {
                        call.arguments.push_str(fragment);
                        out.push(StreamEvent::ToolInputDelta {
                            id: call.id.clone(),
                            delta: fragment.to_string(),
                        });
                    }
                    continue;
                }
                let id = tc
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or_else(|| format!("call_{index}"), str::to_string);
                let name = str_at(tc, "/function/name").to_string();
                out.push(StreamEvent::ToolInputStart {
                    id: id.clone(),
                    name: name.clone(),
                });
                if !fragment.is_empty() {
                    out.push(StreamEvent::ToolInputDelta {
                        id: id.clone(),
                        delta: fragment.to_string(),
                    });
                }
                self.calls.insert(
                    index,
                    PendingCall {
                        id,
                        name,
                        arguments: fragment.to_string(),
                    },
                );
            }
        }
        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            self.reason = Some(BackendFinish::from_upstream(reason));
            out.extend(self.flush_calls());
        }
        out
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished || (self.reason.is_none() && self.usage.is_none()) {
            return self.flush_calls();
        }
        self.terminate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_types::ToolResult;

    #[test]
    fn test_body_shape() {
        let req = GenerationRequest {
            system: Some("sys".into()),
            messages: vec![
                Message::user_text("q"),
                Message::Assistant(vec![AssistantPart::ToolCall {
                    id: "c1".into(),
                    name: "f".into(),
                    input: json!({"a": 1}),
                }]),
                Message::Tool(vec![ToolResult {
                    tool_call_id: "c1".into(),
                    tool_name: "f".into(),
                    output: "r".into(),
                }]),
            ],
            max_output_tokens: Some(16_000),
            stop: vec!["X".into()],
            ..GenerationRequest::default()
        };
        let body = build_chat_body("openai/gpt-oss-120b", &req);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs[0], json!({"role": "system", "content": "sys"}));
        assert_eq!(msgs[1], json!({"role": "user", "content": "q"}));
        assert!(msgs[2]["content"].is_null());
        assert_eq!(msgs[2]["tool_calls"][0]["function"]["arguments"], r#"{"a":1}"#);
        assert_eq!(msgs[3]["role"], "tool");
        assert_eq!(body["max_tokens"], 16_000);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stop"], json!(["X"]));
    }

    fn feed(chunks: &[&str]) -> Vec<StreamEvent> {
        let mut d = ChatDecoder::new();
        let mut out: Vec<StreamEvent> = chunks.iter().flat_map(|c| d.on_event("", c)).collect();
        out.extend(d.finish());
        out
    }

    #[test]
    fn test_decode_text_and_usage() {
        let out = feed(&[
            r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"content":"Hi"}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
            "[DONE]",
        ]);
        assert_eq!(
            out,
            vec![
                StreamEvent::text("Hi"),
                StreamEvent::Finish {
                    reason: BackendFinish::Stop,
                    usage: Some(Usage {
                        input_tokens: 3,
                        output_tokens: 1
                    }),
                },
            ]
        );
    }

    #[test]
    fn test_decode_tool_calls_by_index() {
        let out = feed(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"f","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"g","arguments":"{}"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"x\":1}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]);
        assert_eq!(
            out[0],
            StreamEvent::ToolInputStart {
                id: "call_a".into(),
                name: "f".into()
            }
        );
        assert_eq!(
            out[3],
            StreamEvent::ToolInputDelta {
                id: "call_a".into(),
                delta: "{\"x\":1}".into()
            }
        );
        assert_eq!(
            out[4],
            StreamEvent::ToolCall {
                id: "call_a".into(),
                name: "f".into(),
                input: json!({"x": 1})
            }
        );
        assert_eq!(
            out[5],
            StreamEvent::ToolCall {
                id: "call_b".into(),
                name: "g".into(),
                input: json!({})
            }
        );
        assert!(matches!(
            out[6],
            StreamEvent::Finish {
                reason: BackendFinish::ToolCalls,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_error_payload() {
        let out = feed(&[r#"{"error":{"message":"rate limited"}}"#]);
        assert_eq!(out, vec![StreamEvent::error("rate limited")]);
    }

    #[test]
    fn test_decode_missing_done() {
        let out = feed(&[r#"{"choices":[{"delta":{"content":"a"},"finish_reason":"length"}]}"#]);
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[1],
            StreamEvent::Finish {
                reason: BackendFinish::Length,
                ..
            }
        ));
    }
}
