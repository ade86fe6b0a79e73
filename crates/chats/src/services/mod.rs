//! Chat services.

pub mod conversation;
pub mod resolution;

pub use conversation::ConversationService;
pub use resolution::ChatResolutionService;
