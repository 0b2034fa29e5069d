//! HTTP API for the bot relay

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::artifact::ArtifactPersister;
use crate::bots::BotRegistry;
use crate::config::ServerConfig;
use crate::session::ThreadLocks;
use crate::stream::{EventNormalizer, StreamBroker};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bots: Arc<BotRegistry>,
    pub broker: StreamBroker,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig, bots: BotRegistry) -> Self {
        Self::with_persister(config, bots, ArtifactPersister::filesystem())
    }

    pub fn with_persister(
        config: ServerConfig,
        bots: BotRegistry,
        persister: ArtifactPersister,
    ) -> Self {
        let normalizer = EventNormalizer::new(persister);
        Self {
            bots: Arc::new(bots),
            broker: StreamBroker::new(normalizer, ThreadLocks::new()),
            config: Arc::new(config),
        }
    }
}
