//! # chatline realtime crate
//!
//! Everything that happens over live connections:
//!
//! - [`ConnectionRegistry`]: which users are online, one canonical
//!   connection each
//! - [`PresenceBroadcaster`]: online/offline fan-out
//! - [`MessageRouter`]: persist-then-deliver for messages, plus typing
//!   indicators
//! - [`ClientSession`]: per-connection dispatch of [`ClientEvent`]s
//!
//! The transport is not part of this crate. A connection is represented by a
//! [`ConnectionHandle`], the sending half of a bounded queue that the
//! transport drains.

pub mod error;
pub mod events;
pub mod presence;
pub mod registry;
pub mod router;
pub mod session;

pub use error::RouterError;
pub use events::{ClientEvent, DeliveredMessage, PresenceEntry, ServerEvent};
pub use presence::{PresenceBroadcaster, PresenceChange};
pub use registry::{
    ConnectionHandle, ConnectionId, ConnectionRegistry, DeliveryOutcome, LiveConnection,
    RegisterOutcome,
};
pub use router::{Delivery, DeliveryReport, MessageRouter, SentMessage, MAX_CONTENT_LENGTH};
pub use session::ClientSession;
