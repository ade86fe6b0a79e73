pub mod errors;

pub use errors::{ChatError, ChatResult};

/// Upper bound on group chat names, in characters.
pub const MAX_GROUP_NAME_LENGTH: usize = 100;

/// Where a history read starts. At most one bound may be set.
#[derive(Debug, Clone, Default)]
pub struct HistoryRange {
    /// Any RFC 3339 timestamp; only messages created strictly after it.
    pub after: Option<String>,
    /// A message id from the same chat; only messages stored after it.
    pub after_message: Option<String>,
}

impl HistoryRange {
    pub fn after(timestamp: impl Into<String>) -> Self {
        Self {
            after: Some(timestamp.into()),
            after_message: None,
        }
    }

    pub fn after_message(message_id: impl Into<String>) -> Self {
        Self {
            after: None,
            after_message: Some(message_id.into()),
        }
    }
}
