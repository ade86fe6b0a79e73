//! Online/offline notifications.

use tracing::debug;

use crate::events::ServerEvent;
use crate::registry::{ConnectionId, DeliveryOutcome, LiveConnection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChange {
    pub user_id: String,
    pub email: String,
    pub online: bool,
}

impl PresenceChange {
    pub fn to_event(&self) -> ServerEvent {
        if self.online {
            ServerEvent::UserOnline {
                user_id: self.user_id.clone(),
                email: self.email.clone(),
            }
        } else {
            ServerEvent::UserOffline {
                user_id: self.user_id.clone(),
                email: self.email.clone(),
            }
        }
    }
}

/// Fans presence transitions out to live connections. The registry calls
/// this while holding its write lock.
pub struct PresenceBroadcaster;

impl PresenceBroadcaster {
    /// Sends `change` to every target except `except`. Never blocks; a full
    /// or closed queue only loses this one event. Returns how many
    /// connections accepted it.
    pub fn announce<'a>(
        change: &PresenceChange,
        targets: impl IntoIterator<Item = &'a LiveConnection>,
        except: Option<ConnectionId>,
    ) -> usize {
        let event = change.to_event();
        let mut delivered = 0;

        for target in targets {
            if Some(target.handle.id()) == except {
                continue;
            }
            match target.handle.deliver(event.clone()) {
                DeliveryOutcome::Delivered => delivered += 1,
                outcome => debug!(
                    target = %target.user_id,
                    subject = %change.user_id,
                    online = change.online,
                    ?outcome,
                    "presence update not delivered"
                ),
            }
        }

        delivered
    }
}
