use chatline_chats::ChatError;
use chatline_database::DatabaseError;
use thiserror::Error;

/// Why a send was refused. Nothing was persisted or delivered when one of
/// these is returned.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("sender is not a verified user")]
    SenderUnverified,
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),
    #[error("recipient has not verified their email: {0}")]
    RecipientUnverified(String),
    #[error("chat not found: {0}")]
    ChatNotFound(String),
    #[error("sender is not a participant of this chat")]
    NotParticipant,
    #[error("invalid message content: {0}")]
    InvalidContent(String),
    #[error("cannot send a message to yourself")]
    SelfMessage,
    #[error("message store unavailable: {0}")]
    StoreUnavailable(#[source] DatabaseError),
}

impl RouterError {
    /// Stable identifier sent to clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::SenderUnverified => "sender_unverified",
            RouterError::RecipientNotFound(_) => "recipient_not_found",
            RouterError::RecipientUnverified(_) => "recipient_unverified",
            RouterError::ChatNotFound(_) => "chat_not_found",
            RouterError::NotParticipant => "not_participant",
            RouterError::InvalidContent(_) => "invalid_content",
            RouterError::SelfMessage => "self_message",
            RouterError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<DatabaseError> for RouterError {
    fn from(err: DatabaseError) -> Self {
        RouterError::StoreUnavailable(err)
    }
}

impl From<ChatError> for RouterError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::RequesterNotFound => RouterError::SenderUnverified,
            ChatError::RecipientNotFound(email) => RouterError::RecipientNotFound(email),
            ChatError::RecipientUnverified(email) => RouterError::RecipientUnverified(email),
            ChatError::SelfChat => RouterError::SelfMessage,
            ChatError::ChatNotFound(id) => RouterError::ChatNotFound(id),
            ChatError::NotParticipant => RouterError::NotParticipant,
            ChatError::NotAGroup => RouterError::InvalidContent("not a group chat".into()),
            ChatError::InvalidInput(message) => RouterError::InvalidContent(message),
            ChatError::Store(err) => RouterError::StoreUnavailable(err),
        }
    }
}
