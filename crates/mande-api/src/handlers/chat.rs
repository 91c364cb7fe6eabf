use axum::{extract::State, Json};
use serde::Deserialize;

use mande_core::{CancelHandle, CancelOnDrop, ChatTurn};

use crate::error::ApiError;
use crate::handlers::Owner;
use crate::services::ChatReply;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Answer a chat message.
///
/// If the client disconnects, this future is dropped and the guard cancels
/// the in-flight generation call.
pub async fn chat(
    State(state): State<AppState>,
    Owner(owner_id): Owner,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let handle = CancelHandle::new();
    let signal = handle.signal();
    let guard = CancelOnDrop::new(handle);

    let reply = state
        .chat
        .respond(owner_id, &request.message, &request.history, &signal)
        .await;
    guard.disarm();

    Ok(Json(reply?))
}
