//! Finds or creates the direct chat between two users.

use std::sync::Arc;

use chatline_database::{Chat, ChatStore, CreateChatRequest, User};
use tracing::debug;

use crate::types::{ChatError, ChatResult};

/// There is at most one direct chat per unordered pair of users. Creation is
/// delegated to [`ChatStore::create_chat`], which resolves races between
/// concurrent callers to a single row.
pub struct ChatResolutionService<S> {
    store: Arc<S>,
}

impl<S> Clone for ChatResolutionService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ChatStore> ChatResolutionService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the direct chat between `user_a` and `user_b`, creating it if
    /// needed. The argument order does not matter. `user_b` must be verified.
    pub async fn resolve_or_create_two_party_chat(
        &self,
        user_a: &User,
        user_b: &User,
    ) -> ChatResult<Chat> {
        if user_a.id == user_b.id {
            return Err(ChatError::SelfChat);
        }
        if !user_b.is_verified {
            return Err(ChatError::RecipientUnverified(user_b.email.clone()));
        }

        if let Some(chat) = self.store.find_two_party_chat(user_a.id, user_b.id).await? {
            return Ok(chat);
        }

        let chat = self
            .store
            .create_chat(CreateChatRequest::Direct {
                user_a: user_a.id,
                user_b: user_b.id,
            })
            .await?;

        debug!(
            chat = %chat.public_id,
            user_a = %user_a.public_id,
            user_b = %user_b.public_id,
            "resolved direct chat"
        );
        Ok(chat)
    }

    /// Looks both users up and resolves their direct chat.
    pub async fn start_chat(&self, requester_id: &str, target_email: &str) -> ChatResult<Chat> {
        let requester = self
            .store
            .find_user_by_id(requester_id)
            .await?
            .ok_or(ChatError::RequesterNotFound)?;

        let target = self
            .store
            .find_user_by_email(target_email)
            .await?
            .ok_or_else(|| ChatError::RecipientNotFound(target_email.trim().to_string()))?;

        self.resolve_or_create_two_party_chat(&requester, &target)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_database::MemoryStore;

    fn service() -> (Arc<MemoryStore>, ChatResolutionService<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), ChatResolutionService::new(store))
    }

    #[tokio::test]
    async fn creates_chat_once_per_pair() {
        let (store, service) = service();
        let alice = store.insert_user("alice@example.com", true).await;
        let bob = store.insert_user("bob@example.com", true).await;

        let first = service
            .resolve_or_create_two_party_chat(&alice, &bob)
            .await
            .unwrap();
        let second = service
            .resolve_or_create_two_party_chat(&bob, &alice)
            .await
            .unwrap();

        assert_eq!(first.public_id, second.public_id);
        assert_eq!(store.chat_count().await, 1);
        assert!(first.is_participant(alice.id) && first.is_participant(bob.id));
    }

    #[tokio::test]
    async fn rejects_unverified_recipient_without_creating() {
        let (store, service) = service();
        let alice = store.insert_user("alice@example.com", true).await;
        let bob = store.insert_user("bob@example.com", false).await;

        let result = service.resolve_or_create_two_party_chat(&alice, &bob).await;
        assert!(matches!(result, Err(ChatError::RecipientUnverified(email)) if email == "bob@example.com"));
        assert_eq!(store.chat_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_self_chat() {
        let (store, service) = service();
        let alice = store.insert_user("alice@example.com", true).await;

        let result = service.resolve_or_create_two_party_chat(&alice, &alice).await;
        assert!(matches!(result, Err(ChatError::SelfChat)));
        assert_eq!(store.chat_count().await, 0);
    }

    #[tokio::test]
    async fn start_chat_looks_up_both_sides() {
        let (store, service) = service();
        let alice = store.insert_user("alice@example.com", true).await;
        store.insert_user("bob@example.com", true).await;

        let chat = service
            .start_chat(&alice.public_id, "  BOB@example.com ")
            .await
            .unwrap();
        assert_eq!(chat.participants.len(), 2);

        assert!(matches!(
            service.start_chat(&alice.public_id, "nobody@example.com").await,
            Err(ChatError::RecipientNotFound(_))
        ));
        assert!(matches!(
            service.start_chat("user-404", "bob@example.com").await,
            Err(ChatError::RequesterNotFound)
        ));
    }

    #[tokio::test]
    async fn concurrent_resolution_yields_single_chat() {
        let (store, service) = service();
        let alice = store.insert_user("alice@example.com", true).await;
        let bob = store.insert_user("bob@example.com", true).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let service = service.clone();
            let (a, b) = if i % 2 == 0 {
                (alice.clone(), bob.clone())
            } else {
                (bob.clone(), alice.clone())
            };
            handles.push(tokio::spawn(async move {
                service.resolve_or_create_two_party_chat(&a, &b).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().public_id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(store.chat_count().await, 1);
    }
}
