//! Message REST endpoints. Sending goes through the same router as the
//! WebSocket, so live recipients get the message pushed either way.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chatline_auth::Principal;
use chatline_chats::HistoryRange;
use chatline_database::Message;
use chatline_realtime::{Delivery, SentMessage};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{GatewayError, GatewayResult};
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_email: String,
    pub content: String,
    pub created_at: String,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.public_id,
            chat_id: message.chat_public_id,
            sender_id: message.sender_public_id,
            sender_email: message.sender_email,
            content: message.content,
            created_at: message.created_at,
        }
    }
}

/// Exactly one of `to_email` (direct message) or `chat_id` (existing chat)
/// must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub to_email: Option<String>,
    pub chat_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryResponse {
    pub user_id: String,
    /// `delivered`, `offline`, `saturated` or `closed`.
    pub outcome: String,
}

impl From<Delivery> for DeliveryResponse {
    fn from(delivery: Delivery) -> Self {
        Self {
            user_id: delivery.user_id,
            outcome: delivery.outcome.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendMessageResponse {
    pub message: MessageResponse,
    pub deliveries: Vec<DeliveryResponse>,
}

impl From<SentMessage> for SendMessageResponse {
    fn from(sent: SentMessage) -> Self {
        Self {
            message: sent.message.into(),
            deliveries: sent
                .delivery
                .deliveries
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only messages created strictly after this RFC 3339 timestamp (any
    /// offset, fractional seconds optional).
    pub after: Option<String>,
    /// Only messages stored after this message id. Use the last id you hold to
    /// page without skipping messages that share its timestamp.
    pub after_message: Option<String>,
}

impl From<HistoryQuery> for HistoryRange {
    fn from(query: HistoryQuery) -> Self {
        Self {
            after: query.after,
            after_message: query.after_message,
        }
    }
}

pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/messages/send", post(send_message))
        .route("/messages/all", get(list_all_messages))
        .route("/messages/received", get(list_received_messages))
        .route("/messages/:chat_id", get(list_messages))
}

#[utoipa::path(
    post,
    path = "/messages/send",
    tag = "messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored and pushed to live recipients", body = SendMessageResponse),
        (status = 403, description = "Sender unverified or not a participant", body = ErrorResponse),
        (status = 404, description = "Unknown recipient or chat", body = ErrorResponse),
        (status = 422, description = "Rejected content or recipient", body = ErrorResponse),
        (status = 503, description = "Message store unavailable", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn send_message(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<SendMessageRequest>,
) -> GatewayResult<(StatusCode, Json<SendMessageResponse>)> {
    let sent = match (request.to_email.as_deref(), request.chat_id.as_deref()) {
        (Some(to_email), None) => {
            state
                .router
                .send_message(&principal.user_id, to_email, &request.content)
                .await?
        }
        (None, Some(chat_id)) => {
            state
                .router
                .send_chat_message(&principal.user_id, chat_id, &request.content)
                .await?
        }
        _ => {
            return Err(GatewayError::InvalidRequest(
                "exactly one of to_email or chat_id is required".to_string(),
            ))
        }
    };

    Ok((StatusCode::CREATED, Json(sent.into())))
}

#[utoipa::path(
    get,
    path = "/messages/{chat_id}",
    tag = "messages",
    params(("chat_id" = String, Path, description = "Chat id"), HistoryQuery),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<MessageResponse>),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Unknown chat", body = ErrorResponse),
        (status = 422, description = "Unparsable or conflicting bounds", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
    Path(chat_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .conversations
        .history(&principal.user_id, &chat_id, &query.into())
        .await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/messages/all",
    tag = "messages",
    responses(
        (status = 200, description = "Messages from all of the caller's chats, oldest first", body = Vec<MessageResponse>)
    ),
    security(("bearer" = []))
)]
pub async fn list_all_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state.conversations.all_messages(&principal.user_id).await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/messages/received",
    tag = "messages",
    responses(
        (status = 200, description = "Messages others sent into the caller's chats, newest first", body = Vec<MessageResponse>)
    ),
    security(("bearer" = []))
)]
pub async fn list_received_messages(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<Vec<MessageResponse>>> {
    let messages = state
        .conversations
        .received_messages(&principal.user_id)
        .await?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
