//! Board assistant endpoint.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};

use super::errors::{assistant_error, task_error};
use super::routes::AppState;
use super::types::{ChatRequest, ChatResponse};

/// Answer a question about the current board.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let board = state.tracker.board().await.map_err(task_error)?;
    let reply = state
        .assistant
        .ask(&board, &req.message, &req.history)
        .await
        .map_err(assistant_error)?;
    Ok(Json(ChatResponse { reply }))
}
