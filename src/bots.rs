//! Registry of available bots
//!
//! Bots are registered in code at startup. Each wraps a graph in one of the
//! two scheduling models; the registry hides which one from the HTTP layer.

use crate::graph::{ConversationGraph, GraphError, SyncConversationGraph, ThreadConfig};
use crate::stream::{BrokerRequest, FrameStream, ResponseHooks, StreamBroker};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub enum BotGraph {
    Async(Arc<dyn ConversationGraph>),
    Blocking(Arc<dyn SyncConversationGraph>),
}

impl BotGraph {
    /// Run one request through the broker with the matching driver
    pub fn respond(&self, broker: &StreamBroker, request: BrokerRequest) -> FrameStream {
        match self {
            BotGraph::Async(graph) => broker.stream(graph.clone(), request),
            BotGraph::Blocking(graph) => broker.stream_blocking(graph.clone(), request),
        }
    }

    pub async fn get_state(&self, config: &ThreadConfig) -> Result<Value, GraphError> {
        match self {
            BotGraph::Async(graph) => graph.get_state(config).await,
            BotGraph::Blocking(graph) => {
                let graph = graph.clone();
                let config = config.clone();
                tokio::task::spawn_blocking(move || graph.get_state(&config))
                    .await
                    .map_err(|e| GraphError::Unavailable(e.to_string()))?
            }
        }
    }
}

#[derive(Clone)]
pub struct BotEntry {
    pub description: String,
    /// Options a client may set in the request `config`
    pub config_options: Value,
    pub graph: BotGraph,
    /// Output rewriting and filtering for this bot only
    pub hooks: Option<Arc<dyn ResponseHooks>>,
}

impl BotEntry {
    pub fn respond(&self, broker: &StreamBroker, request: BrokerRequest) -> FrameStream {
        match &self.hooks {
            Some(hooks) => self.graph.respond(&broker.with_hooks(hooks.clone()), request),
            None => self.graph.respond(broker, request),
        }
    }
}

/// Public description of a bot
#[derive(Debug, Clone, Serialize)]
pub struct BotInfo {
    pub bot_type: String,
    pub description: String,
    pub config_options: Value,
}

#[derive(Clone, Default)]
pub struct BotRegistry {
    bots: BTreeMap<String, BotEntry>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bot_type: impl Into<String>, entry: BotEntry) {
        let bot_type = bot_type.into();
        if self.bots.insert(bot_type.clone(), entry).is_some() {
            tracing::warn!(bot_type = %bot_type, "Replaced existing bot registration");
        }
    }

    pub fn register_async(
        &mut self,
        bot_type: impl Into<String>,
        description: impl Into<String>,
        graph: Arc<dyn ConversationGraph>,
    ) {
        self.register(
            bot_type,
            BotEntry {
                description: description.into(),
                config_options: Value::Object(serde_json::Map::new()),
                graph: BotGraph::Async(graph),
                hooks: None,
            },
        );
    }

    pub fn register_blocking(
        &mut self,
        bot_type: impl Into<String>,
        description: impl Into<String>,
        graph: Arc<dyn SyncConversationGraph>,
    ) {
        self.register(
            bot_type,
            BotEntry {
                description: description.into(),
                config_options: Value::Object(serde_json::Map::new()),
                graph: BotGraph::Blocking(graph),
                hooks: None,
            },
        );
    }

    pub fn get(&self, bot_type: &str) -> Option<&BotEntry> {
        self.bots.get(bot_type)
    }

    pub fn list(&self) -> Vec<BotInfo> {
        self.bots
            .iter()
            .map(|(bot_type, entry)| BotInfo {
                bot_type: bot_type.clone(),
                description: entry.description.clone(),
                config_options: entry.config_options.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }
}
