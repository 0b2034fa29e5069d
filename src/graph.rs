//! Conversation graph contracts
//!
//! A bot is driven by an external state machine that decides which node or
//! tool runs next. This crate never looks inside it: it only pulls step
//! events, one at a time, and turns them into client-facing output.
//!
//! Two scheduling models are supported:
//! - [`ConversationGraph`]: a cooperative async source of steps
//! - [`SyncConversationGraph`]: a blocking iterator, driven on a worker thread

pub mod echo;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
    System,
}

/// Message content: plain text, or structured data (e.g. a list of content parts)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Value),
}

impl MessageContent {
    /// Empty text, null, or an empty list/object
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Structured(value) => match value {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Array(items) => items.is_empty(),
                Value::Object(map) => map.is_empty(),
                Value::Bool(_) | Value::Number(_) => false,
            },
        }
    }

    /// Text form: structured content is JSON-encoded
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) | MessageContent::Structured(Value::String(text)) => {
                text.clone()
            }
            MessageContent::Structured(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMessage {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl GraphMessage {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self { role, content }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Text(text.into()))
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Tool, MessageContent::Text(text.into()))
    }
}

// ============================================================================
// Step events
// ============================================================================

/// What one producer (node or agent) contributed to a step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPayload {
    /// Absent when the producer updated other state only
    pub messages: Option<Vec<GraphMessage>>,
}

impl StepPayload {
    pub fn messages(messages: Vec<GraphMessage>) -> Self {
        Self {
            messages: Some(messages),
        }
    }

    /// Only the newest message of a payload is ever shown
    pub fn last_message(&self) -> Option<&GraphMessage> {
        self.messages.as_ref().and_then(|m| m.last())
    }
}

/// One step of graph execution: producer name to payload, in producer order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepEvent {
    entries: Vec<(String, StepPayload)>,
}

impl StepEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(producer: impl Into<String>, payload: StepPayload) -> Self {
        Self::new().with(producer, payload)
    }

    /// Step with one producer emitting one message
    pub fn message(producer: impl Into<String>, message: GraphMessage) -> Self {
        Self::single(producer, StepPayload::messages(vec![message]))
    }

    #[must_use]
    pub fn with(mut self, producer: impl Into<String>, payload: StepPayload) -> Self {
        self.entries.push((producer.into(), payload));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &StepPayload)> {
        self.entries.iter().map(|(p, payload)| (p.as_str(), payload))
    }
}

// ============================================================================
// Configuration & errors
// ============================================================================

/// Per-request configuration handed to the graph
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ThreadConfig {
    pub thread_id: String,
    /// Ceiling on steps the graph may take before giving up
    pub recursion_limit: Option<u32>,
    /// Free-form bot options (`llm_provider`, `llm_model`, ...)
    pub options: Map<String, Value>,
}

impl ThreadConfig {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_recursion_limit(mut self, limit: Option<u32>) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// String-valued option, if set
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("{0}")]
    Execution(String),
    #[error("Recursion limit of {0} reached without a final answer")]
    RecursionLimit(u32),
    #[error("Graph unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Graph traits
// ============================================================================

pub type StepStream = BoxStream<'static, Result<StepEvent, GraphError>>;
pub type StepIter = Box<dyn Iterator<Item = Result<StepEvent, GraphError>> + Send>;

/// Cooperative step source. Failures may happen at start or between steps.
#[async_trait]
pub trait ConversationGraph: Send + Sync {
    async fn stream(&self, input: String, config: &ThreadConfig) -> Result<StepStream, GraphError>;

    /// Diagnostic snapshot of the thread's graph state
    async fn get_state(&self, _config: &ThreadConfig) -> Result<Value, GraphError> {
        Ok(Value::Null)
    }
}

/// Blocking step source, iterated on a dedicated worker thread.
pub trait SyncConversationGraph: Send + Sync {
    fn stream(&self, input: String, config: &ThreadConfig) -> Result<StepIter, GraphError>;

    fn get_state(&self, _config: &ThreadConfig) -> Result<Value, GraphError> {
        Ok(Value::Null)
    }
}

/// The single input message a graph receives per request.
pub fn format_input_message(context: &str, thread_id: &str, message: &str) -> String {
    format!("Context: {context}\n\nthread_id: {thread_id}\n\nUser query: {message}")
}

/// Recover the user query from a [`format_input_message`] string.
pub fn user_query(input: &str) -> &str {
    input
        .split_once("\n\nUser query: ")
        .map_or(input, |(_, query)| query)
}
