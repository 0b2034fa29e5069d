//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    BotListResponse, BotRequest, ErrorResponse, FinalResponse, ThreadFilesResponse,
    ThreadStateResponse,
};
use super::AppState;
use crate::artifact::{list_thread_files, read_thread_file, PersistError, ThreadContext};
use crate::bots::BotEntry;
use crate::graph::{format_input_message, ThreadConfig};
use crate::stream::{collect_final, BrokerRequest, StreamError};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Bot discovery
        .route("/api/bots", get(list_bots))
        // Chat: streamed, or final answer only
        .route("/api/bots/:bot_type", post(stream_bot))
        .route("/api/bots/:bot_type/final", post(final_bot))
        // Diagnostics
        .route(
            "/api/bots/:bot_type/threads/:thread_id/state",
            get(get_thread_state),
        )
        // Artifact browser
        .route("/api/threads/:thread_id/files", get(list_files))
        .route("/api/threads/:thread_id/files/*path", get(read_file))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Bots
// ============================================================

async fn list_bots(State(state): State<AppState>) -> Json<BotListResponse> {
    Json(BotListResponse {
        bots: state.bots.list(),
    })
}

/// Validate a chat request and turn it into a broker request
fn prepare_request(
    state: &AppState,
    bot_type: &str,
    body: BotRequest,
) -> Result<(BotEntry, BrokerRequest), AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }
    let entry = state
        .bots
        .get(bot_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown bot type: {bot_type}")))?;

    let thread_id = body
        .config
        .thread_id
        .unwrap_or_else(|| state.config.default_thread_id.clone());
    let thread = ThreadContext::new(thread_id.clone(), state.config.storage_root.clone())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut config = ThreadConfig::new(thread_id.clone())
        .with_recursion_limit(body.config.recursion_limit.or(state.config.recursion_limit));
    config.options = body.config.options;
    let input = format_input_message(&body.context, &thread_id, &body.message);
    let request = BrokerRequest::new(input, config, thread);

    tracing::info!(
        request_id = %request.request_id,
        bot_type = %bot_type,
        thread_id = %thread_id,
        message_len = body.message.len(),
        "Bot request accepted"
    );
    Ok((entry.clone(), request))
}

async fn stream_bot(
    State(state): State<AppState>,
    Path(bot_type): Path<String>,
    Json(body): Json<BotRequest>,
) -> Result<Response, AppError> {
    let (bot, request) = prepare_request(&state, &bot_type, body)?;
    let frames = bot.respond(&state.broker, request);
    Ok(sse_stream(frames).into_response())
}

async fn final_bot(
    State(state): State<AppState>,
    Path(bot_type): Path<String>,
    Json(body): Json<BotRequest>,
) -> Result<Json<FinalResponse>, AppError> {
    let (bot, request) = prepare_request(&state, &bot_type, body)?;
    let content = collect_final(bot.respond(&state.broker, request)).await?;
    Ok(Json(FinalResponse { content }))
}

async fn get_thread_state(
    State(state): State<AppState>,
    Path((bot_type, thread_id)): Path<(String, String)>,
) -> Result<Json<ThreadStateResponse>, AppError> {
    let entry = state
        .bots
        .get(&bot_type)
        .ok_or_else(|| AppError::NotFound(format!("Unknown bot type: {bot_type}")))?;

    let config = ThreadConfig::new(thread_id.clone());
    let graph_state = entry
        .graph
        .get_state(&config)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))?;

    Ok(Json(ThreadStateResponse {
        bot_type,
        thread_id,
        state: graph_state,
    }))
}

// ============================================================
// Artifact Browser
// ============================================================

fn thread_context(state: &AppState, thread_id: &str) -> Result<ThreadContext, AppError> {
    ThreadContext::new(thread_id, state.config.storage_root.clone())
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

async fn list_files(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadFilesResponse>, AppError> {
    let thread = thread_context(&state, &thread_id)?;
    let files = list_thread_files(&thread)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| AppError::NotFound(format!("No files for thread {thread_id}")))?;

    Ok(Json(ThreadFilesResponse {
        thread_id,
        files,
        listed_at: Utc::now(),
    }))
}

async fn read_file(
    State(state): State<AppState>,
    Path((thread_id, path)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let thread = thread_context(&state, &thread_id)?;
    let bytes = read_thread_file(&thread, &path)?
        .ok_or_else(|| AppError::NotFound(format!("File not found: {path}")))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.as_ref().to_string())], bytes).into_response())
}

async fn get_version() -> &'static str {
    concat!("bot-relay ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl From<PersistError> for AppError {
    fn from(e: PersistError) -> Self {
        match e {
            PersistError::Io { .. } => AppError::Internal(e.to_string()),
            PersistError::InvalidThreadId(_)
            | PersistError::PathTraversal(_)
            | PersistError::EmptyPath(_) => AppError::BadRequest(e.to_string()),
        }
    }
}

impl From<StreamError> for AppError {
    fn from(e: StreamError) -> Self {
        AppError::BadGateway(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %message, "Request failed");
        }
        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
