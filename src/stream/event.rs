//! Client-facing events and their wire encoding

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Intermediate,
    Final,
    Error,
}

/// One unit of client-visible output. `content` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub content: String,
}

impl NormalizedEvent {
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == EventKind::Error
    }
}

/// What the broker yields: an event, or the end-of-stream sentinel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Event(NormalizedEvent),
    Done,
}

impl StreamFrame {
    pub const DONE_MARKER: &'static str = "[DONE]";

    /// Payload of the SSE `data:` field
    pub fn data(&self) -> String {
        match self {
            StreamFrame::Event(event) => serde_json::to_string(event)
                .unwrap_or_else(|e| format!(r#"{{"type":"error","content":"{e}"}}"#)),
            StreamFrame::Done => Self::DONE_MARKER.to_string(),
        }
    }

    /// Full SSE record, `data: <payload>\n\n`
    #[cfg(test)]
    pub fn encode(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    pub fn event(&self) -> Option<&NormalizedEvent> {
        match self {
            StreamFrame::Event(event) => Some(event),
            StreamFrame::Done => None,
        }
    }
}

impl From<NormalizedEvent> for StreamFrame {
    fn from(event: NormalizedEvent) -> Self {
        StreamFrame::Event(event)
    }
}
