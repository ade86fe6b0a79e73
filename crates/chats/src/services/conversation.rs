//! Chat listings, history and group membership.

use std::sync::Arc;

use chatline_database::{
    Chat, ChatKind, ChatStore, ChatSummary, CreateChatRequest, HistoryCursor, Message, User,
};
use tracing::info;

use crate::types::{ChatError, ChatResult, HistoryRange, MAX_GROUP_NAME_LENGTH};

pub struct ConversationService<S> {
    store: Arc<S>,
}

impl<S> Clone for ConversationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ChatStore> ConversationService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Chats the user takes part in, most recently active first.
    pub async fn list_chats(&self, user_id: &str) -> ChatResult<Vec<ChatSummary>> {
        let user = self.requester(user_id).await?;
        Ok(self.store.list_chats_for_user(user.id).await?)
    }

    /// Messages of a chat, oldest first, limited to `range`. Only
    /// participants may read.
    pub async fn history(
        &self,
        user_id: &str,
        chat_id: &str,
        range: &HistoryRange,
    ) -> ChatResult<Vec<Message>> {
        let user = self.requester(user_id).await?;
        let chat = self.participant_chat(&user, chat_id).await?;
        let cursor = self.cursor(&chat, range).await?;
        Ok(self
            .store
            .list_messages_for_chat(chat.id, cursor.as_ref())
            .await?)
    }

    /// Every message across the user's chats, oldest first.
    pub async fn all_messages(&self, user_id: &str) -> ChatResult<Vec<Message>> {
        let user = self.requester(user_id).await?;
        Ok(self.store.list_messages_for_user(user.id).await?)
    }

    /// Messages other participants sent into the user's chats, newest first.
    pub async fn received_messages(&self, user_id: &str) -> ChatResult<Vec<Message>> {
        let user = self.requester(user_id).await?;
        Ok(self.store.list_received_messages(user.id).await?)
    }

    /// Loads a chat and checks that `user` takes part in it.
    pub async fn participant_chat(&self, user: &User, chat_id: &str) -> ChatResult<Chat> {
        let chat = self
            .store
            .find_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))?;

        if !chat.is_participant(user.id) {
            return Err(ChatError::NotParticipant);
        }
        Ok(chat)
    }

    pub async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        member_emails: &[String],
    ) -> ChatResult<Chat> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("group name must not be empty".into()));
        }
        if name.chars().count() > MAX_GROUP_NAME_LENGTH {
            return Err(ChatError::InvalidInput(format!(
                "group name must be at most {MAX_GROUP_NAME_LENGTH} characters"
            )));
        }

        let creator = self.requester(creator_id).await?;
        let mut participant_ids = vec![creator.id];
        for email in member_emails {
            let member = self.verified_member(email).await?;
            participant_ids.push(member.id);
        }

        let chat = self
            .store
            .create_chat(CreateChatRequest::Group {
                name: name.to_string(),
                participant_ids,
            })
            .await?;

        info!(
            chat = %chat.public_id,
            creator = %creator.public_id,
            members = chat.participants.len(),
            "created group chat"
        );
        Ok(chat)
    }

    /// Adds a verified user to a group chat. The actor must already be a
    /// participant. Adding an existing member is a no-op.
    pub async fn add_member(&self, actor_id: &str, chat_id: &str, email: &str) -> ChatResult<Chat> {
        let actor = self.requester(actor_id).await?;
        let chat = self.participant_chat(&actor, chat_id).await?;
        if chat.kind != ChatKind::Group {
            return Err(ChatError::NotAGroup);
        }

        let member = self.verified_member(email).await?;
        if self.store.add_participant(chat.id, member.id).await? {
            info!(chat = %chat.public_id, member = %member.public_id, "added group member");
        }

        self.store
            .find_chat(chat_id)
            .await?
            .ok_or_else(|| ChatError::ChatNotFound(chat_id.to_string()))
    }

    async fn cursor(&self, chat: &Chat, range: &HistoryRange) -> ChatResult<Option<HistoryCursor>> {
        match (range.after.as_deref(), range.after_message.as_deref()) {
            (None, None) => Ok(None),
            (Some(after), None) => HistoryCursor::since(after).map(Some).ok_or_else(|| {
                ChatError::InvalidInput(format!("after is not an RFC 3339 timestamp: {after}"))
            }),
            (None, Some(message_id)) => {
                let message = self
                    .store
                    .find_message(message_id)
                    .await?
                    .filter(|message| message.chat_id == chat.id)
                    .ok_or_else(|| {
                        ChatError::InvalidInput(format!("unknown message in this chat: {message_id}"))
                    })?;
                Ok(Some(HistoryCursor::after_message(&message)))
            }
            (Some(_), Some(_)) => Err(ChatError::InvalidInput(
                "after and after_message cannot be combined".into(),
            )),
        }
    }

    async fn requester(&self, user_id: &str) -> ChatResult<User> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or(ChatError::RequesterNotFound)
    }

    async fn verified_member(&self, email: &str) -> ChatResult<User> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| ChatError::RecipientNotFound(email.trim().to_string()))?;
        if !user.is_verified {
            return Err(ChatError::RecipientUnverified(user.email));
        }
        Ok(user)
    }
}
