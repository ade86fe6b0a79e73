//! # chatline chats crate
//!
//! Business rules for chats: finding or creating the one direct chat between
//! two users, reading history, and managing group membership. Persistence
//! goes through [`chatline_database::ChatStore`].

pub mod services;
pub mod types;

pub use services::{ChatResolutionService, ConversationService};
pub use types::{ChatError, ChatResult, HistoryRange, MAX_GROUP_NAME_LENGTH};
