//! One live connection's view of the realtime core: registration on open,
//! dispatch of inbound frames, unregistration on close.

use chatline_auth::Principal;
use chatline_database::ChatStore;
use tracing::{debug, warn};

use crate::error::RouterError;
use crate::events::{ClientEvent, ServerEvent};
use crate::registry::{ConnectionHandle, ConnectionId, DeliveryOutcome, RegisterOutcome};
use crate::router::MessageRouter;

pub struct ClientSession<S> {
    principal: Principal,
    handle: ConnectionHandle,
    router: MessageRouter<S>,
}

impl<S: ChatStore> ClientSession<S> {
    /// Registers the connection and queues `hello` followed by a presence
    /// snapshot that already includes this connection.
    pub async fn open(
        router: MessageRouter<S>,
        principal: Principal,
        handle: ConnectionHandle,
    ) -> (Self, RegisterOutcome) {
        let outcome = router
            .registry()
            .register(&principal, handle.clone())
            .await;

        let session = Self {
            principal,
            handle,
            router,
        };
        session
            .reply(ServerEvent::Hello {
                user_id: session.principal.user_id.clone(),
                email: session.principal.email.clone(),
                connection_id: session.handle.id().to_string(),
            })
            .await;
        session.send_presence_snapshot().await;

        (session, outcome)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.handle.id()
    }

    /// Parses and dispatches one text frame. Frames that do not parse are
    /// answered with an `invalid_event` error; the connection stays usable.
    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(err) => {
                debug!(user = %self.principal.user_id, error = %err, "invalid client frame");
                self.reply(ServerEvent::error("invalid_event", err.to_string(), None))
                    .await;
            }
        }
    }

    pub async fn handle(&self, event: ClientEvent) {
        match event {
            ClientEvent::Ping => {
                self.reply(ServerEvent::Pong).await;
            }
            ClientEvent::RequestPresenceSnapshot => {
                self.send_presence_snapshot().await;
            }
            ClientEvent::Typing { to_email } => {
                self.router.emit_typing(&self.principal, &to_email).await;
            }
            ClientEvent::StopTyping { to_email } => {
                self.router.emit_stop_typing(&self.principal, &to_email).await;
            }
            ClientEvent::SendMessage {
                to_email,
                content,
                request_id,
            } => {
                let result = self
                    .router
                    .send_message(&self.principal.user_id, &to_email, &content)
                    .await;
                if let Err(err) = result {
                    self.reply_error(&err, request_id).await;
                }
            }
            ClientEvent::SendChatMessage {
                chat_id,
                content,
                request_id,
            } => {
                let result = self
                    .router
                    .send_chat_message(&self.principal.user_id, &chat_id, &content)
                    .await;
                if let Err(err) = result {
                    self.reply_error(&err, request_id).await;
                }
            }
        }
    }

    /// Unregisters the connection. A no-op if a newer connection has taken
    /// over for this user.
    pub async fn close(self) -> bool {
        self.router.registry().unregister(self.handle.id()).await
    }

    async fn send_presence_snapshot(&self) {
        let entries = self.router.registry().snapshot_presence().await;
        self.reply(ServerEvent::PresenceSnapshot { entries }).await;
    }

    async fn reply_error(&self, err: &RouterError, request_id: Option<String>) {
        match err {
            RouterError::StoreUnavailable(_) => {
                warn!(user = %self.principal.user_id, error = %err, "send failed")
            }
            _ => debug!(user = %self.principal.user_id, error = %err, "send rejected"),
        }
        self.reply(ServerEvent::error(err.code(), err.to_string(), request_id))
            .await;
    }

    async fn reply(&self, event: ServerEvent) -> DeliveryOutcome {
        self.handle.send(event).await
    }
}
