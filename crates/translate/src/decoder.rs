//! Upstream SSE → [`StreamEvent`] decoding seam.

use relaygate_types::StreamEvent;
use serde_json::Value;

/// A pure state machine turning one upstream protocol's SSE events into
/// unified stream events. Transport is handled by the caller.
pub trait UpstreamDecoder: Send {
    /// Decode one SSE event. `event` is the SSE `event:` field (may be empty).
    fn on_event(&mut self, event: &str, data: &str) -> Vec<StreamEvent>;

    /// Called once when the upstream body ends.
    fn finish(&mut self) -> Vec<StreamEvent>;
}

/// Parse an SSE data payload, reporting malformed JSON as an error event.
pub(crate) fn parse_data(data: &str) -> Result<Value, StreamEvent> {
    serde_json::from_str(data)
        .map_err(|e| StreamEvent::error(format!("invalid upstream event payload: {e}")))
}

/// Parse accumulated tool arguments; an empty buffer is `{}`, invalid JSON is
/// kept as a raw string.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub(crate) fn str_at<'a>(v: &'a Value, pointer: &str) -> &'a str {
    v.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}
