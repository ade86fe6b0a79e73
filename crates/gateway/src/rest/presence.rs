use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::rest::ErrorResponse;
use crate::state::GatewayState;

#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceEntryResponse {
    pub user_id: String,
    pub email: String,
}

pub fn create_presence_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/presence", get(list_presence))
}

#[utoipa::path(
    get,
    path = "/presence",
    tag = "presence",
    responses(
        (status = 200, description = "Users with a live connection", body = Vec<PresenceEntryResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_presence(
    State(state): State<Arc<GatewayState>>,
) -> Json<Vec<PresenceEntryResponse>> {
    let entries = state.registry.snapshot_presence().await;
    Json(
        entries
            .into_iter()
            .map(|entry| PresenceEntryResponse {
                user_id: entry.user_id,
                email: entry.email,
            })
            .collect(),
    )
}
