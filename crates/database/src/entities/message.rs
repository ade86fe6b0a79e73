//! Message entity definitions

use serde::{Deserialize, Serialize};

/// A persisted chat message. Append-only: rows are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    #[serde(skip_serializing)]
    pub chat_id: i64,
    pub chat_public_id: String,
    #[serde(skip_serializing)]
    pub sender_id: i64,
    pub sender_public_id: String,
    pub sender_email: String,
    pub content: String,
    pub created_at: String,
}

/// A position in a chat's history; listings return what comes strictly after
/// it. `created_at` is always in the stored timestamp format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCursor {
    pub created_at: String,
    /// Set when the cursor is a stored message, so messages sharing its
    /// timestamp are ordered by id instead of being skipped.
    pub message_id: Option<i64>,
}

impl HistoryCursor {
    /// A cursor at an arbitrary RFC 3339 instant. `None` if it does not parse.
    pub fn since(timestamp: &str) -> Option<Self> {
        super::canonical_timestamp(timestamp).map(|created_at| Self {
            created_at,
            message_id: None,
        })
    }

    pub fn after_message(message: &Message) -> Self {
        Self {
            created_at: message.created_at.clone(),
            message_id: Some(message.id),
        }
    }

    /// Whether `message` lies strictly after this cursor.
    pub fn precedes(&self, message: &Message) -> bool {
        match self.message_id {
            Some(id) => (message.created_at.as_str(), message.id) > (self.created_at.as_str(), id),
            None => message.created_at > self.created_at,
        }
    }
}
