//! Chat HTTP routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use super::api_error::ApiError;
use super::state::{GuardedChatHandler, ServerState};
use crate::chat::{ChatReply, ChatRequest};
use crate::video_store::{ChatMessage, ChatSession};

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session: ChatSession,
    pub messages: Vec<ChatMessage>,
}

/// POST /chat - Ask a question, optionally about one video
async fn post_message(
    State(chat): State<GuardedChatHandler>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    debug!(
        "Chat message (video: {:?}, session: {:?})",
        request.video_id, request.session_id
    );
    Ok(Json(chat.handle(request).await?))
}

async fn get_transcript(
    State(chat): State<GuardedChatHandler>,
    Path(session_id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let (session, messages) = chat.transcript(&session_id)?;
    Ok(Json(TranscriptResponse { session, messages }))
}

pub fn make_chat_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", post(post_message))
        .route("/{session_id}", get(get_transcript))
        .with_state(state)
}
