/// Chat endpoints
///
/// Message sender ids are resolved to display names at render time; the
/// stored records keep stable ids only.
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::identity::IdentityStore;
use crate::middleware::Caller;
use crate::models::{Chat, Message, UserId};
use crate::services::ChatService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: String,
    pub sender: UserId,
    pub sender_name: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub deleted: bool,
}

impl MessageView {
    fn render(message: Message, identity: &IdentityStore) -> Self {
        let sender_name = identity.display_name_or_unknown(&message.sender);
        Self {
            id: message.id,
            sender: message.sender,
            sender_name,
            body: message.body,
            sent_at: message.sent_at,
            deleted: message.deleted,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: String,
    pub ride_id: String,
    pub participants: Vec<UserId>,
    pub messages: Vec<MessageView>,
}

impl ChatView {
    pub fn render(chat: Chat, identity: &IdentityStore) -> Self {
        Self {
            id: chat.id,
            ride_id: chat.ride_id,
            participants: chat.participants.into_iter().collect(),
            messages: chat
                .messages
                .into_iter()
                .map(|m| MessageView::render(m, identity))
                .collect(),
        }
    }
}

/// **Endpoint**: `POST /rides/:id/chat`
#[post("/rides/{ride_id}/chat")]
pub async fn create_chat(
    state: web::Data<AppState>,
    caller: Caller,
    ride_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let chat = ChatService::create_chat(&state.store, &ride_id, &caller.0)?;
    Ok(HttpResponse::Created().json(ChatView::render(chat, &state.identity)))
}

/// Chats the caller participates in (one-shot; `/ws?intent=chats` is the
/// live variant).
///
/// **Endpoint**: `GET /chats`
#[get("/chats")]
pub async fn my_chats(state: web::Data<AppState>, caller: Caller) -> Result<HttpResponse, AppError> {
    let chats: Vec<ChatView> = ChatService::my_chats(&state.store, &caller.0)
        .into_iter()
        .map(|chat| ChatView::render(chat, &state.identity))
        .collect();
    Ok(HttpResponse::Ok().json(chats))
}

/// **Endpoint**: `GET /chats/:id`
#[get("/chats/{chat_id}")]
pub async fn get_chat(
    state: web::Data<AppState>,
    caller: Caller,
    chat_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let chat = ChatService::get_chat(&state.store, &chat_id, &caller.0)?;
    Ok(HttpResponse::Ok().json(ChatView::render(chat, &state.identity)))
}

/// **Endpoint**: `POST /chats/:id/messages`
#[post("/chats/{chat_id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    caller: Caller,
    chat_id: web::Path<String>,
    request: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message =
        ChatService::send_message(&state.store, &chat_id, caller.0, request.into_inner().body)?;
    Ok(HttpResponse::Created().json(MessageView::render(message, &state.identity)))
}

/// **Endpoint**: `DELETE /chats/:id/messages/:message_id`
#[delete("/chats/{chat_id}/messages/{message_id}")]
pub async fn delete_message(
    state: web::Data<AppState>,
    caller: Caller,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (chat_id, message_id) = path.into_inner();
    ChatService::delete_message(&state.store, &state.identity, &chat_id, &message_id, &caller.0)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "deleted" })))
}
