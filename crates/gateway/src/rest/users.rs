//! User directory endpoints.

use std::sync::Arc;

use axum::{extract::State, routing::get, Extension, Json, Router};
use chatline_auth::Principal;
use chatline_users::DirectoryEntry;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::GatewayResult;
use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DirectoryEntryResponse {
    pub id: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<DirectoryEntry> for DirectoryEntryResponse {
    fn from(entry: DirectoryEntry) -> Self {
        Self {
            id: entry.id,
            email: entry.email,
            is_verified: entry.is_verified,
            created_at: entry.created_at,
        }
    }
}

pub fn create_user_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/users/others", get(list_other_users))
        .route("/users/emails", get(list_other_emails))
}

#[utoipa::path(
    get,
    path = "/users/others",
    tag = "users",
    responses(
        (status = 200, description = "Every user except the caller", body = Vec<DirectoryEntryResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_other_users(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<Vec<DirectoryEntryResponse>>> {
    let entries = state.users.list_others(&principal.user_id).await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/users/emails",
    tag = "users",
    responses(
        (status = 200, description = "Emails of every user except the caller", body = Vec<String>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_other_emails(
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> GatewayResult<Json<Vec<String>>> {
    Ok(Json(state.users.list_other_emails(&principal.user_id).await?))
}
