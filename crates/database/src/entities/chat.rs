//! Chat entity definitions

use serde::{Deserialize, Serialize};

use super::Message;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub kind: ChatKind,
    pub name: Option<String>,
    pub participants: Vec<ChatParticipant>,
    pub created_at: String,
}

impl Chat {
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants
            .iter()
            .any(|participant| participant.user_id == user_id)
    }

    pub fn participant_public_ids(&self) -> impl Iterator<Item = &str> {
        self.participants
            .iter()
            .map(|participant| participant.public_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatParticipant {
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub public_id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatKind::Direct => "direct",
            ChatKind::Group => "group",
        }
    }
}

impl From<&str> for ChatKind {
    fn from(s: &str) -> Self {
        match s {
            "group" => ChatKind::Group,
            _ => ChatKind::Direct,
        }
    }
}

/// A chat together with its most recent message, for chat lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat: Chat,
    pub latest_message: Option<Message>,
}

impl ChatSummary {
    /// Timestamp used to order chat lists: latest message, else creation.
    pub fn last_activity(&self) -> &str {
        self.latest_message
            .as_ref()
            .map(|message| message.created_at.as_str())
            .unwrap_or(self.chat.created_at.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateChatRequest {
    /// Two-party chat; creation is idempotent per unordered pair.
    Direct { user_a: i64, user_b: i64 },
    Group {
        name: String,
        participant_ids: Vec<i64>,
    },
}

/// Normalised key for an unordered pair of user ids.
///
/// ```
/// use chatline_database::pair_key;
///
/// assert_eq!(pair_key(7, 3), "3:7");
/// assert_eq!(pair_key(3, 7), pair_key(7, 3));
/// ```
pub fn pair_key(a: i64, b: i64) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}
