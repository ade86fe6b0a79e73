//! The process-local map of who is connected right now.
//!
//! One canonical live connection per user (a newer connection replaces the
//! older one). Every mutation happens under a single write lock, and presence
//! deltas are fanned out while that lock is held so every client observes
//! transitions in the order the registry applied them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chatline_auth::Principal;
use chatline_database::normalize_email;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{PresenceEntry, ServerEvent};
use crate::presence::{PresenceBroadcaster, PresenceChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result of handing an event to a connection. Only `Delivered` means the
/// event was queued; none of the others are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    /// No live connection for the target.
    Offline,
    /// The connection's outbound queue is full; the event was dropped.
    Saturated,
    /// The transport behind the handle has gone away.
    Closed,
    /// Not attempted: the signal was addressed to its own sender.
    Skipped,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::Offline => "offline",
            DeliveryOutcome::Saturated => "saturated",
            DeliveryOutcome::Closed => "closed",
            DeliveryOutcome::Skipped => "skipped",
        }
    }
}

/// Sending half of a live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
        }
    }

    /// A handle plus the receiver the transport drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self::new(sender), receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues without waiting. Used for fan-out to other users' connections.
    pub fn deliver(&self, event: ServerEvent) -> DeliveryOutcome {
        match self.sender.try_send(event) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(TrySendError::Full(_)) => DeliveryOutcome::Saturated,
            Err(TrySendError::Closed(_)) => DeliveryOutcome::Closed,
        }
    }

    /// Queues, waiting for room. Used for replies to this connection's own
    /// requests.
    pub async fn send(&self, event: ServerEvent) -> DeliveryOutcome {
        match self.sender.send(event).await {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(_) => DeliveryOutcome::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveConnection {
    pub user_id: String,
    pub email: String,
    pub handle: ConnectionHandle,
    pub joined_at: DateTime<Utc>,
}

impl LiveConnection {
    pub fn presence_entry(&self) -> PresenceEntry {
        PresenceEntry {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The user was offline and is now online.
    Online,
    /// The user was already online; the given connection is no longer
    /// canonical.
    Replaced(ConnectionId),
}

#[derive(Default)]
struct Inner {
    by_user: HashMap<String, LiveConnection>,
    /// Normalised email -> user id.
    by_email: HashMap<String, String>,
    /// Canonical connections only.
    by_connection: HashMap<ConnectionId, String>,
}

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `handle` the canonical connection for `principal`. Announces
    /// the user as online to everyone else only if they were offline.
    pub async fn register(&self, principal: &Principal, handle: ConnectionHandle) -> RegisterOutcome {
        let email = normalize_email(&principal.email);
        let connection_id = handle.id();

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let live = LiveConnection {
            user_id: principal.user_id.clone(),
            email: email.clone(),
            handle,
            joined_at: Utc::now(),
        };
        let previous = inner.by_user.insert(principal.user_id.clone(), live);

        if let Some(previous) = &previous {
            inner.by_connection.remove(&previous.handle.id());
            if previous.email != email {
                inner.by_email.remove(&previous.email);
            }
        }
        inner
            .by_email
            .insert(email.clone(), principal.user_id.clone());
        inner
            .by_connection
            .insert(connection_id, principal.user_id.clone());

        match previous {
            Some(previous) => {
                debug!(
                    user = %principal.user_id,
                    connection = %connection_id,
                    superseded = %previous.handle.id(),
                    "connection replaced"
                );
                RegisterOutcome::Replaced(previous.handle.id())
            }
            None => {
                let change = PresenceChange {
                    user_id: principal.user_id.clone(),
                    email,
                    online: true,
                };
                let notified =
                    PresenceBroadcaster::announce(&change, inner.by_user.values(), Some(connection_id));
                info!(
                    user = %principal.user_id,
                    connection = %connection_id,
                    online = inner.by_user.len(),
                    notified,
                    "user online"
                );
                RegisterOutcome::Online
            }
        }
    }

    /// Removes the connection if it is still canonical for its user and
    /// announces the user as offline. Returns whether anything was removed;
    /// unregistering a superseded or unknown connection is a no-op.
    pub async fn unregister(&self, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let Some(user_id) = inner.by_connection.remove(&connection_id) else {
            debug!(connection = %connection_id, "ignoring stale unregister");
            return false;
        };
        let Some(live) = inner.by_user.remove(&user_id) else {
            return false;
        };
        inner.by_email.remove(&live.email);

        let change = PresenceChange {
            user_id: live.user_id,
            email: live.email,
            online: false,
        };
        let notified = PresenceBroadcaster::announce(&change, inner.by_user.values(), None);
        info!(
            user = %change.user_id,
            connection = %connection_id,
            online = inner.by_user.len(),
            notified,
            "user offline"
        );
        true
    }

    pub async fn lookup_by_email(&self, email: &str) -> Option<LiveConnection> {
        let inner = self.inner.read().await;
        inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|user_id| inner.by_user.get(user_id))
            .cloned()
    }

    pub async fn lookup_by_user_id(&self, user_id: &str) -> Option<LiveConnection> {
        self.inner.read().await.by_user.get(user_id).cloned()
    }

    /// Owned snapshot of every live connection.
    pub async fn list_all(&self) -> Vec<LiveConnection> {
        self.inner.read().await.by_user.values().cloned().collect()
    }

    /// Who is online right now, ordered by email.
    pub async fn snapshot_presence(&self) -> Vec<PresenceEntry> {
        let inner = self.inner.read().await;
        let mut entries: Vec<PresenceEntry> = inner
            .by_user
            .values()
            .map(LiveConnection::presence_entry)
            .collect();
        entries.sort_by(|a, b| a.email.cmp(&b.email));
        entries
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.inner.read().await.by_user.contains_key(user_id)
    }

    /// Whether `connection_id` is the canonical connection of some user.
    pub async fn is_canonical(&self, connection_id: ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .by_connection
            .contains_key(&connection_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_user.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Best-effort push to the user's canonical connection, if any.
    pub async fn deliver_to_user(&self, user_id: &str, event: ServerEvent) -> DeliveryOutcome {
        let inner = self.inner.read().await;
        match inner.by_user.get(user_id) {
            Some(live) => live.handle.deliver(event),
            None => DeliveryOutcome::Offline,
        }
    }

    pub async fn deliver_to_email(&self, email: &str, event: ServerEvent) -> DeliveryOutcome {
        let inner = self.inner.read().await;
        match inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|user_id| inner.by_user.get(user_id))
        {
            Some(live) => live.handle.deliver(event),
            None => DeliveryOutcome::Offline,
        }
    }
}
