//! chatline database crate
//!
//! Connection management, embedded migrations, the repositories for users,
//! chats and messages, and [`ChatStore`], the persistence contract the chat
//! core is written against.

use chatline_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod migrations;
pub mod repos;
pub mod store;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{ChatRepository, MessageRepository, UserRepository};

pub use entities::{
    canonical_timestamp, normalize_email, pair_key, timestamp_now, Chat, ChatKind,
    ChatParticipant, ChatSummary, CreateChatRequest, HistoryCursor, Message, User,
};

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryStore;
pub use store::{ChatStore, SqliteStore};

pub use types::{DatabaseError, DatabaseResult};

/// Connect and migrate.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
