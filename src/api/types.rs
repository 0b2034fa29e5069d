//! API request and response types

use crate::artifact::FileTree;
use crate::bots::BotInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request to talk to a bot
#[derive(Debug, Deserialize)]
pub struct BotRequest {
    pub message: String,
    /// Prior context prepended to the graph input
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub config: RequestConfig,
}

/// Per-request bot configuration
#[derive(Debug, Default, Deserialize)]
pub struct RequestConfig {
    pub thread_id: Option<String>,
    pub recursion_limit: Option<u32>,
    /// Everything else (`llm_provider`, `llm_model`, ...) goes to the graph as-is
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

/// Response with the available bots
#[derive(Debug, Serialize)]
pub struct BotListResponse {
    pub bots: Vec<BotInfo>,
}

/// Response for final-only requests
#[derive(Debug, Serialize)]
pub struct FinalResponse {
    pub content: String,
}

/// Diagnostic graph state for one thread
#[derive(Debug, Serialize)]
pub struct ThreadStateResponse {
    pub bot_type: String,
    pub thread_id: String,
    pub state: Value,
}

/// Artifacts saved for one thread
#[derive(Debug, Serialize)]
pub struct ThreadFilesResponse {
    pub thread_id: String,
    pub files: FileTree,
    pub listed_at: DateTime<Utc>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
