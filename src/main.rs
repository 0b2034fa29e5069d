//! Bot relay - streaming front end for LLM conversation graphs
//!
//! Runs bot graphs step by step, streams their output to clients as
//! Server-Sent Events, and saves the file artifacts embedded in responses.

mod api;
mod artifact;
mod bots;
mod config;
mod graph;
mod session;
mod stream;

use api::{create_router, AppState};
use bots::BotRegistry;
use config::ServerConfig;
use graph::echo::{BlockingEchoGraph, EchoGraph};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bot_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = ServerConfig::from_env();
    std::fs::create_dir_all(&config.storage_root)?;
    tracing::info!(
        storage_root = %config.storage_root.display(),
        recursion_limit = ?config.recursion_limit,
        default_thread = %config.default_thread_id,
        "Artifact storage ready"
    );

    // Bots
    let mut bots = BotRegistry::new();
    bots.register_async(
        "echo-bot",
        "Repeats the user query; fenced blocks in it are saved as artifacts",
        Arc::new(EchoGraph::new()),
    );
    bots.register_blocking(
        "echo-bot-sync",
        "Echo bot driven as a blocking iterator on a worker thread",
        Arc::new(BlockingEchoGraph::new(Duration::from_millis(50))),
    );
    tracing::info!(bots = bots.len(), "Bot registry initialized");

    let port = config.port;
    let state = AppState::new(config, bots);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Bot relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
