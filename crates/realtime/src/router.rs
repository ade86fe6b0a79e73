//! Persists outgoing messages and pushes them to live connections.
//!
//! The store is written first. Live delivery only happens after the append
//! returned successfully and is best-effort: an offline or saturated
//! recipient is reported in the [`DeliveryReport`], never as an error.

use std::sync::Arc;

use chatline_auth::Principal;
use chatline_chats::{ChatResolutionService, ConversationService};
use chatline_database::{normalize_email, ChatStore, Message, User};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RouterError;
use crate::events::{DeliveredMessage, ServerEvent};
use crate::registry::{ConnectionRegistry, DeliveryOutcome};

/// Longest accepted message, in characters.
pub const MAX_CONTENT_LENGTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub user_id: String,
    pub outcome: DeliveryOutcome,
}

/// Per-recipient outcome of the live fan-out for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub deliveries: Vec<Delivery>,
}

impl DeliveryReport {
    fn record(&mut self, user_id: &str, outcome: DeliveryOutcome) {
        self.deliveries.push(Delivery {
            user_id: user_id.to_string(),
            outcome,
        });
    }

    pub fn outcome_for(&self, user_id: &str) -> Option<DeliveryOutcome> {
        self.deliveries
            .iter()
            .find(|delivery| delivery.user_id == user_id)
            .map(|delivery| delivery.outcome)
    }

    pub fn delivered_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| delivery.outcome.is_delivered())
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub message: Message,
    pub delivery: DeliveryReport,
}

pub struct MessageRouter<S> {
    store: Arc<S>,
    chats: ChatResolutionService<S>,
    conversations: ConversationService<S>,
    registry: ConnectionRegistry,
}

impl<S> Clone for MessageRouter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            chats: self.chats.clone(),
            conversations: self.conversations.clone(),
            registry: self.registry.clone(),
        }
    }
}

impl<S: ChatStore> MessageRouter<S> {
    pub fn new(store: Arc<S>, registry: ConnectionRegistry) -> Self {
        Self {
            chats: ChatResolutionService::new(store.clone()),
            conversations: ConversationService::new(store.clone()),
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Sends a direct message, opening the chat between the two users on
    /// first contact.
    pub async fn send_message(
        &self,
        sender_id: &str,
        recipient_email: &str,
        content: &str,
    ) -> Result<SentMessage, RouterError> {
        validate_content(content)?;
        let sender = self.verified_sender(sender_id).await?;

        let recipient = self
            .store
            .find_user_by_email(recipient_email)
            .await?
            .ok_or_else(|| RouterError::RecipientNotFound(recipient_email.trim().to_string()))?;
        if recipient.id == sender.id {
            return Err(RouterError::SelfMessage);
        }

        let chat = self
            .chats
            .resolve_or_create_two_party_chat(&sender, &recipient)
            .await?;
        let message = self.persist(chat.id, &sender, content).await?;

        let event = ServerEvent::MessageDelivered {
            message: DeliveredMessage::from(&message),
        };
        let mut delivery = DeliveryReport::default();

        let outcome = self
            .registry
            .deliver_to_email(&recipient.email, event.clone())
            .await;
        self.log_miss(&message, &recipient.public_id, outcome);
        delivery.record(&recipient.public_id, outcome);

        let echo = self.registry.deliver_to_user(&sender.public_id, event).await;
        self.log_miss(&message, &sender.public_id, echo);
        delivery.record(&sender.public_id, echo);

        info!(
            message = %message.public_id,
            chat = %message.chat_public_id,
            sender = %sender.public_id,
            delivered = delivery.delivered_count(),
            "message sent"
        );
        Ok(SentMessage { message, delivery })
    }

    /// Sends into an existing chat (direct or group). Every live participant,
    /// the sender included, receives the message.
    pub async fn send_chat_message(
        &self,
        sender_id: &str,
        chat_id: &str,
        content: &str,
    ) -> Result<SentMessage, RouterError> {
        validate_content(content)?;
        let sender = self.verified_sender(sender_id).await?;
        let chat = self.conversations.participant_chat(&sender, chat_id).await?;
        let message = self.persist(chat.id, &sender, content).await?;

        let event = ServerEvent::MessageDelivered {
            message: DeliveredMessage::from(&message),
        };
        let mut delivery = DeliveryReport::default();
        for participant in chat.participant_public_ids() {
            let outcome = self.registry.deliver_to_user(participant, event.clone()).await;
            self.log_miss(&message, participant, outcome);
            delivery.record(participant, outcome);
        }

        info!(
            message = %message.public_id,
            chat = %chat.public_id,
            sender = %sender.public_id,
            participants = chat.participants.len(),
            delivered = delivery.delivered_count(),
            "chat message sent"
        );
        Ok(SentMessage { message, delivery })
    }

    /// Forwards a typing indicator if the target is online. Never persisted,
    /// and never sent back to the typist.
    pub async fn emit_typing(&self, from: &Principal, to_email: &str) -> DeliveryOutcome {
        let event = ServerEvent::Typing {
            from_user_id: from.user_id.clone(),
            from_email: from.email.clone(),
        };
        self.signal(from, to_email, event).await
    }

    pub async fn emit_stop_typing(&self, from: &Principal, to_email: &str) -> DeliveryOutcome {
        let event = ServerEvent::StopTyping {
            from_user_id: from.user_id.clone(),
            from_email: from.email.clone(),
        };
        self.signal(from, to_email, event).await
    }

    async fn signal(&self, from: &Principal, to_email: &str, event: ServerEvent) -> DeliveryOutcome {
        if normalize_email(to_email) == normalize_email(&from.email) {
            return DeliveryOutcome::Skipped;
        }
        self.registry.deliver_to_email(to_email, event).await
    }

    async fn verified_sender(&self, sender_id: &str) -> Result<User, RouterError> {
        match self.store.find_user_by_id(sender_id).await? {
            Some(user) if user.is_verified => Ok(user),
            _ => Err(RouterError::SenderUnverified),
        }
    }

    async fn persist(&self, chat_id: i64, sender: &User, content: &str) -> Result<Message, RouterError> {
        self.store
            .append_message(chat_id, sender.id, content)
            .await
            .map_err(|err| {
                warn!(sender = %sender.public_id, error = %err, "failed to persist message");
                RouterError::StoreUnavailable(err)
            })
    }

    fn log_miss(&self, message: &Message, user_id: &str, outcome: DeliveryOutcome) {
        if !outcome.is_delivered() {
            debug!(
                message = %message.public_id,
                user = %user_id,
                ?outcome,
                "live delivery missed"
            );
        }
    }
}

pub fn validate_content(content: &str) -> Result<(), RouterError> {
    if content.trim().is_empty() {
        return Err(RouterError::InvalidContent(
            "message must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err(RouterError::InvalidContent(format!(
            "message must be at most {MAX_CONTENT_LENGTH} characters"
        )));
    }
    Ok(())
}
