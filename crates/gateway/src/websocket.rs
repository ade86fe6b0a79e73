//! The live connection endpoint.
//!
//! Authentication happens in [`crate::middleware::auth_middleware`] before
//! the upgrade, so a rejected handshake never reaches the registry. After
//! the upgrade each socket gets a bounded outbound queue drained by a send
//! task, while the receive loop feeds frames to a [`ClientSession`].

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    middleware::from_fn_with_state,
    response::Response,
    routing::get,
    Extension, Router,
};
use chatline_auth::Principal;
use chatline_realtime::{ClientSession, ConnectionHandle, RegisterOutcome, ServerEvent};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::middleware::auth_middleware;
use crate::state::GatewayState;

pub fn create_websocket_routes(state: Arc<GatewayState>) -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route_layer(from_fn_with_state(state, auth_middleware))
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
    Extension(principal): Extension<Principal>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, principal))
}

async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, principal: Principal) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, outbound) = ConnectionHandle::channel(state.outbound_buffer);

    let mut send_task = tokio::spawn(async move {
        let mut outbound = outbound;
        while let Some(event) = outbound.recv().await {
            let Some(text) = encode(&event) else {
                continue;
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    let (session, outcome) = ClientSession::open(state.router.clone(), principal, handle).await;
    let connection_id = session.connection_id();
    match outcome {
        RegisterOutcome::Online => {
            info!(user = %session.principal().user_id, connection = %connection_id, "connection opened")
        }
        RegisterOutcome::Replaced(previous) => info!(
            user = %session.principal().user_id,
            connection = %connection_id,
            previous = %previous,
            "connection replaced an existing one"
        ),
    }

    let receive = async {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => session.handle_text(&text).await,
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(connection = %connection_id, error = %err, "websocket receive failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = &mut send_task => {}
        _ = receive => {}
    }
    send_task.abort();

    let user_id = session.principal().user_id.clone();
    if session.close().await {
        info!(user = %user_id, connection = %connection_id, "connection closed");
    } else {
        debug!(user = %user_id, connection = %connection_id, "superseded connection closed");
    }
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(event = event.kind(), error = %err, "failed to encode server event");
            None
        }
    }
}
