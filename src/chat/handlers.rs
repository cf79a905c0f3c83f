use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::MaybeUser;
use crate::chat::service::SessionHistory;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub messages: Vec<MessageResponse>,
}

impl From<SessionHistory> for SessionResponse {
    fn from(history: SessionHistory) -> Self {
        Self {
            session_id: history.session.id,
            start_time: history.session.start_time,
            end_time: history.session.end_time,
            messages: history
                .messages
                .into_iter()
                .map(|m| MessageResponse {
                    id: m.id,
                    sender: m.sender,
                    content: m.content,
                    timestamp: m.timestamp,
                })
                .collect(),
        }
    }
}

pub async fn chatbot(
    req: web::Json<ChatRequest>,
    user: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message must not be empty".into()));
    }

    let exchange = state
        .chat
        .process_message(user.0.map(|u| u.id), message.to_string())
        .await?;

    Ok(HttpResponse::Ok().json(exchange))
}

pub async fn chat_history(
    user: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let history = state.chat.get_history(user.0.map(|u| u.id)).await?;
    let sessions: Vec<SessionResponse> = history.into_iter().map(Into::into).collect();
    let total_sessions = sessions.len();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "history": sessions,
        "total_sessions": total_sessions
    })))
}

pub async fn get_chat_session(
    path: web::Path<Uuid>,
    user: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let history = state
        .chat
        .get_session(path.into_inner(), user.0.map(|u| u.id))
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse::from(history)))
}

pub async fn delete_chat_session(
    path: web::Path<Uuid>,
    user: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    state
        .chat
        .delete_session(session_id, user.0.map(|u| u.id))
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Chat session {} deleted successfully", session_id)
    })))
}

pub async fn delete_all_chat_history(
    user: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let deleted = state.chat.delete_all_history(user.0.map(|u| u.id)).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "All chat history deleted successfully",
        "deleted_sessions": deleted
    })))
}
