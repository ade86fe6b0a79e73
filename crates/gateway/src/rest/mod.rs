//! REST API endpoints for the gateway

pub mod auth;
pub mod chats;
pub mod health;
pub mod messages;
pub mod presence;
pub mod users;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

/// Body of every non-2xx response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Create all REST API routes. Everything except health and the sign-in
/// flows requires a bearer token.
pub fn create_rest_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    let protected = Router::new()
        .merge(auth::create_session_routes())
        .merge(users::create_user_routes())
        .merge(chats::create_chat_routes())
        .merge(messages::create_message_routes())
        .merge(presence::create_presence_routes())
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::create_auth_routes())
        .merge(protected)
}
