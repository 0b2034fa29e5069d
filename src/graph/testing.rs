//! Scripted graph doubles for testing
//!
//! These replay a fixed list of steps through either scheduling model so the
//! broker can be exercised without a real bot.

use super::{
    ConversationGraph, GraphError, GraphMessage, StepEvent, StepIter, StepStream,
    SyncConversationGraph, ThreadConfig,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One assistant message from `agent`
pub fn text_step(text: &str) -> StepEvent {
    StepEvent::message("agent", GraphMessage::assistant(text))
}

// ============================================================================
// Scripted Graph
// ============================================================================

/// Replays `steps`, optionally failing at start or after some steps
#[derive(Debug, Default)]
pub struct ScriptedGraph {
    steps: Vec<StepEvent>,
    fail_after: Option<usize>,
    fail_on_start: bool,
    /// Inputs received, in call order
    pub inputs: Mutex<Vec<String>>,
}

impl ScriptedGraph {
    pub fn new(steps: Vec<StepEvent>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Steps yielding one assistant message each
    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| text_step(t)).collect())
    }

    /// Yield the first `k` steps, then fail
    #[must_use]
    pub fn failing_after(mut self, k: usize) -> Self {
        self.fail_after = Some(k);
        self
    }

    #[must_use]
    pub fn failing_on_start(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    fn script(&self, input: String) -> Result<Vec<Result<StepEvent, GraphError>>, GraphError> {
        self.inputs.lock().unwrap().push(input);
        if self.fail_on_start {
            return Err(GraphError::Unavailable("scripted start failure".into()));
        }
        let mut steps: Vec<_> = self.steps.iter().cloned().map(Ok).collect();
        if let Some(k) = self.fail_after {
            steps.truncate(k);
            steps.push(Err(GraphError::Execution(format!("scripted failure after {k} steps"))));
        }
        Ok(steps)
    }
}

#[async_trait]
impl ConversationGraph for ScriptedGraph {
    async fn stream(&self, input: String, _config: &ThreadConfig) -> Result<StepStream, GraphError> {
        let steps = self.script(input)?;
        Ok(Box::pin(futures::stream::iter(steps)))
    }
}

impl SyncConversationGraph for ScriptedGraph {
    fn stream(&self, input: String, _config: &ThreadConfig) -> Result<StepIter, GraphError> {
        let steps = self.script(input)?;
        Ok(Box::new(steps.into_iter()))
    }
}

// ============================================================================
// Endless Graph
// ============================================================================

/// Blocking graph that never finishes; counts how many steps were pulled
#[derive(Debug, Default)]
pub struct EndlessGraph {
    pub pulled: Arc<AtomicUsize>,
}

impl SyncConversationGraph for EndlessGraph {
    fn stream(&self, _input: String, _config: &ThreadConfig) -> Result<StepIter, GraphError> {
        let pulled = self.pulled.clone();
        Ok(Box::new(std::iter::from_fn(move || {
            std::thread::sleep(Duration::from_millis(2));
            let n = pulled.fetch_add(1, Ordering::SeqCst);
            Some(Ok(text_step(&format!("step {n}"))))
        })))
    }
}

// ============================================================================
// Gated Graph
// ============================================================================

/// Async graph whose single step waits until the gate is opened
pub struct GatedGraph {
    gate: Arc<tokio::sync::Notify>,
    text: String,
}

impl GatedGraph {
    pub fn new(text: &str) -> (Self, Arc<tokio::sync::Notify>) {
        let gate = Arc::new(tokio::sync::Notify::new());
        let graph = Self {
            gate: gate.clone(),
            text: text.to_string(),
        };
        (graph, gate)
    }
}

#[async_trait]
impl ConversationGraph for GatedGraph {
    async fn stream(&self, _input: String, _config: &ThreadConfig) -> Result<StepStream, GraphError> {
        let gate = self.gate.clone();
        let step = text_step(&self.text);
        Ok(Box::pin(futures::stream::once(async move {
            gate.notified().await;
            Ok(step)
        })))
    }
}
