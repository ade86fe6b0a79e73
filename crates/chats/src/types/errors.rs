//! Error types for the chat system.

use chatline_database::DatabaseError;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Requesting user not found")]
    RequesterNotFound,

    #[error("Recipient not found: {0}")]
    RecipientNotFound(String),

    #[error("Recipient has not verified their email: {0}")]
    RecipientUnverified(String),

    #[error("Cannot open a chat with yourself")]
    SelfChat,

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Not a participant of this chat")]
    NotParticipant,

    #[error("Members can only be added to group chats")]
    NotAGroup,

    #[error("Validation error: {0}")]
    InvalidInput(String),

    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),
}
