use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{error::ApiError, state::AppState};
use crate::domain::{ports::SourceRef, sanitize_text, Message};

pub const EMPTY_COLLECTION_REPLY: &str =
    "Please upload and process a document first before asking questions.";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub reply: String,
    pub sources: Vec<SourceRef>,
    pub is_error: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<Message>,
}

pub async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = sanitize_text(&request.message);
    if message.is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }

    let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
    // held until the reply is recorded
    let mut session = state.sessions.open(session_id).await;
    let history = session.messages.clone();
    session.push(Message::user(message.as_str()));

    let outcome = match state.rag.count().await {
        Ok(0) => Ok((EMPTY_COLLECTION_REPLY.to_string(), Vec::new())),
        Ok(_) => state
            .assistant
            .answer(&message, &history)
            .await
            .map(|answer| (answer.content, answer.sources)),
        Err(e) => Err(e),
    };

    let (reply, sources, is_error) = match outcome {
        Ok((reply, sources)) => {
            let preview: String = message.chars().take(50).collect();
            tracing::info!(%session_id, query = %preview, "generated response");
            (reply, sources, false)
        }
        Err(e) => {
            tracing::error!(%session_id, error = %e, "error generating response");
            (format!("Sorry, I encountered an error: {e}"), Vec::new(), true)
        }
    };

    session.push(Message::assistant(reply.as_str()));

    Ok(Json(ChatResponse {
        session_id,
        reply,
        sources,
        is_error,
    }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation = state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Session {session_id} not found")))?;

    Ok(Json(HistoryResponse {
        session_id,
        messages: conversation.messages,
    }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> StatusCode {
    if state.sessions.remove(session_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
