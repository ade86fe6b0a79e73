//! Events exchanged over a live connection.
//!
//! Both directions are closed enums tagged by a `type` field, e.g.
//! `{"type":"send_message","to_email":"bob@example.com","content":"hi"}`.

use chatline_database::Message;
use serde::{Deserialize, Serialize};

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Ping,
    RequestPresenceSnapshot,
    Typing {
        to_email: String,
    },
    StopTyping {
        to_email: String,
    },
    SendMessage {
        to_email: String,
        content: String,
        request_id: Option<String>,
    },
    SendChatMessage {
        chat_id: String,
        content: String,
        request_id: Option<String>,
    },
}

/// Frames the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection.
    Hello {
        user_id: String,
        email: String,
        connection_id: String,
    },
    Pong,
    PresenceSnapshot {
        entries: Vec<PresenceEntry>,
    },
    UserOnline {
        user_id: String,
        email: String,
    },
    UserOffline {
        user_id: String,
        email: String,
    },
    Typing {
        from_user_id: String,
        from_email: String,
    },
    StopTyping {
        from_user_id: String,
        from_email: String,
    },
    MessageDelivered {
        message: DeliveredMessage,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerEvent {
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
            request_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Hello { .. } => "hello",
            ServerEvent::Pong => "pong",
            ServerEvent::PresenceSnapshot { .. } => "presence_snapshot",
            ServerEvent::UserOnline { .. } => "user_online",
            ServerEvent::UserOffline { .. } => "user_offline",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::StopTyping { .. } => "stop_typing",
            ServerEvent::MessageDelivered { .. } => "message_delivered",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: String,
    pub email: String,
}

/// A persisted message as pushed to live connections. `message_id` is stable
/// and is what clients dedupe on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredMessage {
    pub message_id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub sender_email: String,
    pub content: String,
    pub created_at: String,
}

impl From<&Message> for DeliveredMessage {
    fn from(message: &Message) -> Self {
        Self {
            message_id: message.public_id.clone(),
            chat_id: message.chat_public_id.clone(),
            sender_id: message.sender_public_id.clone(),
            sender_email: message.sender_email.clone(),
            content: message.content.clone(),
            created_at: message.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_parse_from_tagged_json() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "send_message",
            "to_email": "bob@example.com",
            "content": "hi"
        }))
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                to_email: "bob@example.com".into(),
                content: "hi".into(),
                request_id: None,
            }
        );

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"request_presence_snapshot"}"#).unwrap();
        assert_eq!(event, ClientEvent::RequestPresenceSnapshot);
    }

    #[test]
    fn unknown_or_incomplete_frames_are_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>(r#"{"type":"typing"}"#).is_err());
        assert!(serde_json::from_str::<ClientEvent>("not json").is_err());
    }

    #[test]
    fn server_events_serialize_with_type_tag() {
        let value = serde_json::to_value(ServerEvent::UserOnline {
            user_id: "u1".into(),
            email: "alice@example.com".into(),
        })
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "user_online", "user_id": "u1", "email": "alice@example.com"})
        );

        let value = serde_json::to_value(ServerEvent::error("invalid_event", "bad", None)).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "code": "invalid_event", "message": "bad"})
        );
        assert_eq!(ServerEvent::Pong.kind(), "pong");
    }
}
