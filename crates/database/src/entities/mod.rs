//! Domain entities for the database layer

pub mod chat;
pub mod message;
pub mod user;

pub use chat::{pair_key, Chat, ChatKind, ChatParticipant, ChatSummary, CreateChatRequest};
pub use message::{HistoryCursor, Message};
pub use user::{normalize_email, User};

/// Timestamp format shared by every table: RFC 3339, UTC, microsecond
/// precision. Fixed width, so lexical order matches chronological order.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parses any RFC 3339 timestamp and renders it in the stored format, so it
/// can be compared against stored values. Sub-microsecond digits are dropped.
pub fn canonical_timestamp(value: &str) -> Option<String> {
    chrono::DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| {
            parsed
                .with_timezone(&chrono::Utc)
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        })
}
