//! `StreamEvent` → OpenAI SSE transform.
//!
//! [`SseTranscoder`] is a single-pass state machine: every call to
//! [`SseTranscoder::on_event`] returns the complete `data: ...\n\n` frames for
//! that event, in order. [`SseTranscoder::finish`] synthesizes the terminal
//! sequence when the input ends without a `finish` or `error` event, so every
//! exit path yields a terminated stream.

use crate::completion::{
    ChatCompletionChunk, CompletionMeta, CompletionUsage, Delta, ErrorBody, FinishReason,
    FunctionDelta, ToolCallDelta,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use relaygate_types::{AssistantPart, BackendFinish, EventStream, StreamEvent, Usage};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Terminator frame.
pub const DONE: &str = "data: [DONE]\n\n";

#[derive(Debug)]
pub struct SseTranscoder {
    meta: CompletionMeta,
    role_sent: bool,
    done: bool,
    has_tool_calls: bool,
    text_after_tools: bool,
    indices: HashMap<String, usize>,
}

impl SseTranscoder {
    #[must_use]
    pub fn new(meta: CompletionMeta) -> Self {
        Self {
            meta,
            role_sent: false,
            done: false,
            has_tool_calls: false,
            text_after_tools: false,
            indices: HashMap::new(),
        }
    }

    /// `true` once the terminator has been emitted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Translate one event. Events after the terminator are ignored.
    pub fn on_event(&mut self, event: StreamEvent) -> Vec<Bytes> {
        if self.done {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(2);
        self.ensure_role(&mut out);

        match event {
            StreamEvent::TextDelta { text } if text.is_empty() => {}
            StreamEvent::TextDelta { text } => {
                if self.has_tool_calls {
                    self.text_after_tools = true;
                }
                out.push(self.chunk(
                    Delta {
                        content: Some(text),
                        ..Delta::default()
                    },
                    None,
                ));
            }
            StreamEvent::ReasoningDelta { .. } => {}
            StreamEvent::ToolInputStart { id, name } => {
                self.has_tool_calls = true;
                let index = self.allocate(&id);
                out.push(self.tool_delta(index, Some(id), Some(name), String::new()));
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                let index = self.indices.get(&id).copied().unwrap_or(0);
                out.push(self.tool_delta(index, None, None, delta));
            }
            StreamEvent::ToolCall { id, name, input } => {
                if !self.indices.contains_key(&id) {
                    self.has_tool_calls = true;
                    let index = self.allocate(&id);
                    let arguments = AssistantPart::arguments_string(&input);
                    out.push(self.tool_delta(index, Some(id), Some(name), arguments));
                }
            }
            StreamEvent::Finish { reason, usage } => {
                self.terminate(&mut out, &reason, usage);
            }
            StreamEvent::Error { message } => {
                tracing::warn!(error = %message, "backend stream error");
                let body = ErrorBody::new(message, "server_error", Some("internal_error"));
                out.push(frame(&body));
                out.push(Bytes::from_static(DONE.as_bytes()));
                self.done = true;
            }
        }
        out
    }

    /// Close the stream. Emits nothing if already terminated.
    pub fn finish(&mut self) -> Vec<Bytes> {
        if self.done {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(3);
        self.ensure_role(&mut out);
        self.terminate(&mut out, &BackendFinish::Stop, None);
        out
    }

    fn ensure_role(&mut self, out: &mut Vec<Bytes>) {
        if !self.role_sent {
            self.role_sent = true;
            out.push(self.chunk(
                Delta {
                    role: Some("assistant".to_string()),
                    ..Delta::default()
                },
                None,
            ));
        }
    }

    fn terminate(&mut self, out: &mut Vec<Bytes>, reason: &BackendFinish, usage: Option<Usage>) {
        let pending = self.has_tool_calls && !self.text_after_tools;
        let mut chunk = ChatCompletionChunk::new(
            &self.meta,
            Delta::default(),
            Some(FinishReason::from_backend(reason, pending)),
        );
        chunk.usage = usage.map(CompletionUsage::from);
        out.push(frame(&chunk));
        out.push(Bytes::from_static(DONE.as_bytes()));
        self.done = true;
    }

    fn allocate(&mut self, id: &str) -> usize {
        let next = self.indices.len();
        *self.indices.entry(id.to_string()).or_insert(next)
    }

    fn tool_delta(
        &self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    ) -> Bytes {
        let kind = id.as_ref().map(|_| "function".to_string());
        self.chunk(
            Delta {
                tool_calls: Some(vec![ToolCallDelta {
                    index,
                    id,
                    kind,
                    function: FunctionDelta { name, arguments },
                }]),
                ..Delta::default()
            },
            None,
        )
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<FinishReason>) -> Bytes {
        frame(&ChatCompletionChunk::new(&self.meta, delta, finish_reason))
    }
}

fn frame<T: Serialize>(value: &T) -> Bytes {
    match serde_json::to_string(value) {
        Ok(json) => Bytes::from(format!("data: {json}\n\n")),
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize SSE frame");
            Bytes::new()
        }
    }
}

struct State {
    events: Option<EventStream>,
    transcoder: SseTranscoder,
    queue: VecDeque<Bytes>,
}

/// Drive a backend event stream through an [`SseTranscoder`].
///
/// Upstream events are pulled only when the previous frames have been
/// yielded, so ordering is preserved and nothing is buffered across events.
pub fn sse_stream(events: EventStream, meta: CompletionMeta) -> impl Stream<Item = Bytes> + Send {
    let state = State {
        events: Some(events),
        transcoder: SseTranscoder::new(meta),
        queue: VecDeque::new(),
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.queue.pop_front() {
                return Some((frame, st));
            }
            if st.transcoder.is_done() {
                return None;
            }
            let next = match st.events.as_mut() {
                Some(events) => events.next().await,
                None => None,
            };
            match next {
                Some(event) => st.queue.extend(st.transcoder.on_event(event)),
                None => {
                    st.events = None;
                    st.queue.extend(st.transcoder.finish());
                }
            }
            if st.transcoder.is_done() {
                st.events = None;
            }
        }
    })
}
