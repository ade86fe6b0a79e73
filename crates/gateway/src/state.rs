//! Shared application state for the gateway

use std::sync::Arc;

use chatline_auth::Authenticator;
use chatline_chats::{ChatResolutionService, ConversationService};
use chatline_config::AppConfig;
use chatline_database::{SqliteStore, UserRepository};
use chatline_realtime::{ConnectionRegistry, MessageRouter};
use chatline_users::UserService;
use sqlx::SqlitePool;

/// Services shared by every REST handler and live connection.
#[derive(Clone)]
pub struct GatewayState {
    pub pool: SqlitePool,
    pub authenticator: Authenticator,
    pub users: UserService<UserRepository>,
    pub chats: ChatResolutionService<SqliteStore>,
    pub conversations: ConversationService<SqliteStore>,
    /// The one registry of live connections for this process.
    pub registry: ConnectionRegistry,
    pub router: MessageRouter<SqliteStore>,
    /// Capacity of each connection's outbound queue.
    pub outbound_buffer: usize,
}

impl GatewayState {
    pub fn new(pool: SqlitePool, authenticator: Authenticator, config: &AppConfig) -> Self {
        let store = Arc::new(SqliteStore::new(pool.clone()));
        let registry = ConnectionRegistry::new();

        Self {
            users: UserService::new(pool.clone()),
            chats: ChatResolutionService::new(store.clone()),
            conversations: ConversationService::new(store.clone()),
            router: MessageRouter::new(store, registry.clone()),
            registry,
            authenticator,
            pool,
            outbound_buffer: config.realtime.outbound_buffer,
        }
    }
}
