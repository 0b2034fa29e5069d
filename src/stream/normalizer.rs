//! Step events to client-facing events
//!
//! For every producer in a step, the newest message is turned into one or more
//! text chunks. Each chunk is scanned for artifacts (persisted as a side
//! effect), post-processed, filtered, and wrapped as a [`NormalizedEvent`].

use super::event::{EventKind, NormalizedEvent};
use crate::artifact::{ArtifactPersister, ThreadContext};
use crate::graph::StepEvent;
use serde_json::Value;
use std::sync::Arc;

/// Per-bot customization of what reaches the client
pub trait ResponseHooks: Send + Sync {
    /// Rewrite a chunk after its artifacts have been persisted
    fn post_process(&self, content: String, _thread: &ThreadContext) -> String {
        content
    }

    /// Return false to suppress a chunk
    fn should_emit(&self, _content: &str, _kind: EventKind) -> bool {
        true
    }
}

/// Emit everything unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ResponseHooks for DefaultHooks {}

#[derive(Clone)]
pub struct EventNormalizer {
    persister: ArtifactPersister,
    hooks: Arc<dyn ResponseHooks>,
}

impl EventNormalizer {
    pub fn new(persister: ArtifactPersister) -> Self {
        Self {
            persister,
            hooks: Arc::new(DefaultHooks),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn ResponseHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Everything a step contributes, tagged `kind`. Empty when nothing is shown.
    pub fn classify(
        &self,
        event: &StepEvent,
        kind: EventKind,
        thread: &ThreadContext,
    ) -> Vec<NormalizedEvent> {
        let mut out = Vec::new();
        for (producer, payload) in event.entries() {
            let Some(message) = payload.last_message() else {
                continue;
            };
            if message.content.is_empty() {
                continue;
            }
            let chunks = split_chunks(message.content.to_text());
            tracing::debug!(
                thread_id = %thread.thread_id(),
                producer = %producer,
                chunks = chunks.len(),
                "Normalizing step output"
            );
            out.extend(
                chunks
                    .into_iter()
                    .filter_map(|chunk| self.process_chunk(chunk, kind, thread)),
            );
        }
        out
    }

    fn process_chunk(
        &self,
        chunk: String,
        kind: EventKind,
        thread: &ThreadContext,
    ) -> Option<NormalizedEvent> {
        let report = self.persister.persist_blocks(thread, &chunk);
        if !report.is_empty() {
            tracing::debug!(
                thread_id = %thread.thread_id(),
                written = report.written.len(),
                failed = report.failed.len(),
                "Persisted artifacts from chunk"
            );
        }

        let content = self.hooks.post_process(chunk, thread);
        if content.is_empty() || !self.hooks.should_emit(&content, kind) {
            return None;
        }
        Some(NormalizedEvent::new(kind, content))
    }
}

/// A JSON list is split into one chunk per item; anything else is one chunk.
fn split_chunks(content: String) -> Vec<String> {
    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => items.into_iter().map(item_text).collect(),
        _ => vec![content],
    }
}

fn item_text(item: Value) -> String {
    match item {
        Value::String(text) => text,
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                return text.clone();
            }
            Value::Object(map).to_string()
        }
        other => other.to_string(),
    }
}
