//! Built-in echo bot
//!
//! Two steps per request: a tool step acknowledging the message, then an
//! assistant step repeating the user query verbatim. Fenced blocks in the
//! query therefore come back out as artifacts, which makes the bot useful for
//! exercising the whole pipeline without a model behind it.

use super::{
    user_query, ConversationGraph, GraphError, GraphMessage, StepEvent, StepIter, StepStream,
    SyncConversationGraph, ThreadConfig,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
struct ThreadTurns {
    turns: u64,
    last_message: String,
}

/// Turn bookkeeping shared by both echo variants
#[derive(Debug, Default)]
struct EchoState {
    threads: Mutex<HashMap<String, ThreadTurns>>,
}

impl EchoState {
    fn record(&self, thread_id: &str, query: &str) -> u64 {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = threads.entry(thread_id.to_string()).or_default();
        entry.turns += 1;
        entry.last_message = query.to_string();
        entry.turns
    }

    fn snapshot(&self, thread_id: &str) -> Value {
        let threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        match threads.get(thread_id) {
            Some(t) => json!({
                "thread_id": thread_id,
                "turns": t.turns,
                "last_message": t.last_message,
            }),
            None => Value::Null,
        }
    }

    fn script(&self, input: &str, config: &ThreadConfig) -> Vec<Result<StepEvent, GraphError>> {
        let query = user_query(input);
        let turn = self.record(&config.thread_id, query);
        let mut receipt = format!("Turn {turn}: received {} characters", query.chars().count());
        if let Some(model) = config.option_str("llm_model") {
            receipt.push_str(&format!(" for {model}"));
        }
        let steps = vec![
            StepEvent::message("receiver", GraphMessage::tool(receipt)),
            StepEvent::message("echo", GraphMessage::assistant(query)),
        ];

        let Some(limit) = config.recursion_limit else {
            return steps.into_iter().map(Ok).collect();
        };
        let allowed = usize::try_from(limit).unwrap_or(usize::MAX);
        if steps.len() <= allowed {
            return steps.into_iter().map(Ok).collect();
        }
        tracing::debug!(thread_id = %config.thread_id, limit, "Echo bot hit recursion limit");
        steps
            .into_iter()
            .take(allowed)
            .map(Ok)
            .chain(std::iter::once(Err(GraphError::RecursionLimit(limit))))
            .collect()
    }
}

/// Cooperative echo bot
#[derive(Debug, Default)]
pub struct EchoGraph {
    state: EchoState,
}

impl EchoGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationGraph for EchoGraph {
    async fn stream(&self, input: String, config: &ThreadConfig) -> Result<StepStream, GraphError> {
        let steps = self.state.script(&input, config);
        Ok(Box::pin(futures::stream::iter(steps)))
    }

    async fn get_state(&self, config: &ThreadConfig) -> Result<Value, GraphError> {
        Ok(self.state.snapshot(&config.thread_id))
    }
}

/// Blocking echo bot; each step blocks the worker for `step_delay`
#[derive(Debug, Default)]
pub struct BlockingEchoGraph {
    state: EchoState,
    step_delay: Duration,
}

impl BlockingEchoGraph {
    pub fn new(step_delay: Duration) -> Self {
        Self {
            state: EchoState::default(),
            step_delay,
        }
    }
}

impl SyncConversationGraph for BlockingEchoGraph {
    fn stream(&self, input: String, config: &ThreadConfig) -> Result<StepIter, GraphError> {
        let steps = self.state.script(&input, config);
        let delay = self.step_delay;
        Ok(Box::new(steps.into_iter().inspect(move |_| {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        })))
    }

    fn get_state(&self, config: &ThreadConfig) -> Result<Value, GraphError> {
        Ok(self.state.snapshot(&config.thread_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::format_input_message;
    use futures::StreamExt;

    fn last_text(step: &StepEvent) -> String {
        step.entries()
            .next()
            .and_then(|(_, p)| p.last_message())
            .map(|m| m.content.to_text())
            .unwrap()
    }

    #[tokio::test]
    async fn test_echo_repeats_query() {
        let graph = EchoGraph::new();
        let config = ThreadConfig::new("t1");
        let input = format_input_message("", "t1", "hello there");

        let steps: Vec<_> = graph.stream(input, &config).await.unwrap().collect().await;

        assert_eq!(steps.len(), 2);
        let steps: Vec<_> = steps.into_iter().map(Result::unwrap).collect();
        assert_eq!(last_text(&steps[0]), "Turn 1: received 11 characters");
        assert_eq!(last_text(&steps[1]), "hello there");
    }

    #[tokio::test]
    async fn test_state_counts_turns() {
        let graph = EchoGraph::new();
        let config = ThreadConfig::new("t1");
        assert_eq!(graph.get_state(&config).await.unwrap(), Value::Null);

        let _ = graph.stream("one".into(), &config).await.unwrap();
        let _ = graph.stream("two".into(), &config).await.unwrap();

        let state = graph.get_state(&config).await.unwrap();
        assert_eq!(state["turns"], 2);
        assert_eq!(state["last_message"], "two");
    }

    #[tokio::test]
    async fn test_receipt_names_requested_model() {
        let graph = EchoGraph::new();
        let mut config = ThreadConfig::new("t1");
        config.options.insert("llm_model".into(), json!("tiny-1"));

        let mut steps = graph.stream("abc".into(), &config).await.unwrap();
        let first = steps.next().await.unwrap().unwrap();
        assert_eq!(last_text(&first), "Turn 1: received 3 characters for tiny-1");
    }

    #[test]
    fn test_recursion_limit_fails_mid_stream() {
        let graph = BlockingEchoGraph::default();
        let config = ThreadConfig::new("t1").with_recursion_limit(Some(1));

        let steps: Vec<_> = graph.stream("hi".into(), &config).unwrap().collect();

        assert_eq!(steps.len(), 2);
        assert!(steps[0].is_ok());
        assert_eq!(steps[1], Err(GraphError::RecursionLimit(1)));
    }

    #[test]
    fn test_generous_limit_is_not_hit() {
        let graph = BlockingEchoGraph::default();
        let config = ThreadConfig::new("t1").with_recursion_limit(Some(25));
        let steps: Vec<_> = graph.stream("hi".into(), &config).unwrap().collect();
        assert!(steps.iter().all(Result::is_ok));
        assert_eq!(steps.len(), 2);
    }
}
