//! Chat REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chatline_auth::Principal;
use chatline_database::{Chat, ChatParticipant, ChatSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::rest::messages::MessageResponse;
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct ParticipantResponse {
    pub id: String,
    pub email: String,
}

impl From<ChatParticipant> for ParticipantResponse {
    fn from(participant: ChatParticipant) -> Self {
        Self {
            id: participant.public_id,
            email: participant.email,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatResponse {
    pub id: String,
    /// `direct` or `group`.
    pub kind: String,
    pub name: Option<String>,
    pub participants: Vec<ParticipantResponse>,
    pub created_at: String,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.public_id,
            kind: chat.kind.as_str().to_string(),
            name: chat.name,
            participants: chat.participants.into_iter().map(Into::into).collect(),
            created_at: chat.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatSummaryResponse {
    pub chat: ChatResponse,
    pub latest_message: Option<MessageResponse>,
}

impl From<ChatSummary> for ChatSummaryResponse {
    fn from(summary: ChatSummary) -> Self {
        Self {
            chat: summary.chat.into(),
            latest_message: summary.latest_message.map(Into::into),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartChatRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub member_emails: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub email: String,
}

pub fn create_chat_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/chats", get(list_chats))
        .route("/chats/start", post(start_chat))
        .route("/groups", post(create_group))
        .route("/groups/:chat_id/members", post(add_member))
}

#[utoipa::path(
    get,
    path = "/chats",
    tag = "chats",
    responses(
        (status = 200, description = "The caller's chats, most recent first", body = Vec<ChatSummaryResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_chats(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<Vec<ChatSummaryResponse>>> {
    let summaries = state.conversations.list_chats(&principal.user_id).await?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/chats/start",
    tag = "chats",
    request_body = StartChatRequest,
    responses(
        (status = 200, description = "The direct chat with that user, created on first contact", body = ChatResponse),
        (status = 404, description = "No such user", body = ErrorResponse),
        (status = 422, description = "Recipient unverified or self", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn start_chat(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<StartChatRequest>,
) -> GatewayResult<Json<ChatResponse>> {
    let chat = state
        .chats
        .start_chat(&principal.user_id, &request.email)
        .await?;
    Ok(Json(chat.into()))
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "chats",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = ChatResponse),
        (status = 404, description = "A member does not exist", body = ErrorResponse),
        (status = 422, description = "Invalid name or unverified member", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_group(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateGroupRequest>,
) -> GatewayResult<(StatusCode, Json<ChatResponse>)> {
    let chat = state
        .conversations
        .create_group(&principal.user_id, &request.name, &request.member_emails)
        .await?;
    Ok((StatusCode::CREATED, Json(chat.into())))
}

#[utoipa::path(
    post,
    path = "/groups/{chat_id}/members",
    tag = "chats",
    params(("chat_id" = String, Path, description = "Group chat id")),
    request_body = AddMemberRequest,
    responses(
        (status = 200, description = "Updated group", body = ChatResponse),
        (status = 403, description = "Caller is not a member", body = ErrorResponse),
        (status = 404, description = "Unknown chat or user", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn add_member(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
    Path(chat_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> GatewayResult<Json<ChatResponse>> {
    let chat = state
        .conversations
        .add_member(&principal.user_id, &chat_id, &request.email)
        .await?;
    Ok(Json(chat.into()))
}
