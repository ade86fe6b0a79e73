//! In-memory [`ChatStore`] for exercising the chat core without SQLite.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use crate::entities::{
    normalize_email, pair_key, timestamp_now, Chat, ChatKind, ChatParticipant, ChatSummary,
    CreateChatRequest, HistoryCursor, Message, User,
};
use crate::store::ChatStore;
use crate::types::{DatabaseError, DatabaseResult};

#[derive(Default)]
struct State {
    users: Vec<User>,
    chats: Vec<StoredChat>,
    messages: Vec<Message>,
}

struct StoredChat {
    id: i64,
    public_id: String,
    kind: ChatKind,
    name: Option<String>,
    pair_key: Option<String>,
    participant_ids: Vec<i64>,
    created_at: String,
}

/// All state lives behind one mutex, which makes `create_chat` atomic in the
/// same way the unique `pair_key` constraint does for SQLite.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_appends: AtomicBool,
    append_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, email: &str, is_verified: bool) -> User {
        let mut state = self.state.lock().await;
        let id = state.users.len() as i64 + 1;
        let now = timestamp_now();
        let user = User {
            id,
            public_id: format!("user-{id}"),
            email: normalize_email(email),
            is_verified,
            created_at: now.clone(),
            updated_at: now,
        };
        state.users.push(user.clone());
        user
    }

    /// Makes every subsequent `append_message` fail.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn append_attempts(&self) -> usize {
        self.append_attempts.load(Ordering::SeqCst)
    }

    pub async fn chat_count(&self) -> usize {
        self.state.lock().await.chats.len()
    }

    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }
}

impl State {
    fn chat(&self, stored: &StoredChat) -> Chat {
        let participants = stored
            .participant_ids
            .iter()
            .filter_map(|id| self.users.iter().find(|user| user.id == *id))
            .map(|user| ChatParticipant {
                user_id: user.id,
                public_id: user.public_id.clone(),
                email: user.email.clone(),
            })
            .collect();

        Chat {
            id: stored.id,
            public_id: stored.public_id.clone(),
            kind: stored.kind,
            name: stored.name.clone(),
            participants,
            created_at: stored.created_at.clone(),
        }
    }

    fn insert_chat(
        &mut self,
        kind: ChatKind,
        name: Option<String>,
        key: Option<String>,
        participant_ids: Vec<i64>,
    ) -> Chat {
        let id = self.chats.len() as i64 + 1;
        let stored = StoredChat {
            id,
            public_id: format!("chat-{id}"),
            kind,
            name,
            pair_key: key,
            participant_ids,
            created_at: timestamp_now(),
        };
        let chat = self.chat(&stored);
        self.chats.push(stored);
        chat
    }

    /// Messages are kept in append order, which is creation order.
    fn messages_in_chats_of(&self, user_id: i64) -> impl Iterator<Item = &Message> + '_ {
        let chat_ids: Vec<i64> = self
            .chats
            .iter()
            .filter(|chat| chat.participant_ids.contains(&user_id))
            .map(|chat| chat.id)
            .collect();
        self.messages
            .iter()
            .filter(move |message| chat_ids.contains(&message.chat_id))
    }
}

impl ChatStore for MemoryStore {
    async fn find_user_by_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .iter()
            .find(|user| user.public_id == public_id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let email = normalize_email(email);
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|user| user.email == email).cloned())
    }

    async fn find_two_party_chat(&self, user_a: i64, user_b: i64) -> DatabaseResult<Option<Chat>> {
        let key = pair_key(user_a, user_b);
        let state = self.state.lock().await;
        Ok(state
            .chats
            .iter()
            .find(|chat| chat.pair_key.as_deref() == Some(key.as_str()))
            .map(|chat| state.chat(chat)))
    }

    async fn create_chat(&self, request: CreateChatRequest) -> DatabaseResult<Chat> {
        let mut state = self.state.lock().await;
        match request {
            CreateChatRequest::Direct { user_a, user_b } => {
                let key = pair_key(user_a, user_b);
                if let Some(existing) = state
                    .chats
                    .iter()
                    .find(|chat| chat.pair_key.as_deref() == Some(key.as_str()))
                {
                    return Ok(state.chat(existing));
                }
                Ok(state.insert_chat(ChatKind::Direct, None, Some(key), vec![user_a, user_b]))
            }
            CreateChatRequest::Group {
                name,
                mut participant_ids,
            } => {
                participant_ids.sort_unstable();
                participant_ids.dedup();
                Ok(state.insert_chat(ChatKind::Group, Some(name), None, participant_ids))
            }
        }
    }

    async fn find_chat(&self, public_id: &str) -> DatabaseResult<Option<Chat>> {
        let state = self.state.lock().await;
        Ok(state
            .chats
            .iter()
            .find(|chat| chat.public_id == public_id)
            .map(|chat| state.chat(chat)))
    }

    async fn add_participant(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let mut state = self.state.lock().await;
        let chat = state
            .chats
            .iter_mut()
            .find(|chat| chat.id == chat_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("chat {chat_id}")))?;

        if chat.participant_ids.contains(&user_id) {
            return Ok(false);
        }
        chat.participant_ids.push(user_id);
        Ok(true)
    }

    async fn append_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
    ) -> DatabaseResult<Message> {
        self.append_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DatabaseError::ConnectionError(
                "store offline (injected)".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let chat_public_id = state
            .chats
            .iter()
            .find(|chat| chat.id == chat_id)
            .map(|chat| chat.public_id.clone())
            .ok_or_else(|| DatabaseError::NotFound(format!("chat {chat_id}")))?;
        let sender = state
            .users
            .iter()
            .find(|user| user.id == sender_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("user {sender_id}")))?;

        let id = state.messages.len() as i64 + 1;
        let message = Message {
            id,
            public_id: format!("message-{id}"),
            chat_id,
            chat_public_id,
            sender_id,
            sender_public_id: sender.public_id,
            sender_email: sender.email,
            content: content.to_string(),
            created_at: timestamp_now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }

    async fn find_message(&self, public_id: &str) -> DatabaseResult<Option<Message>> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .find(|message| message.public_id == public_id)
            .cloned())
    }

    async fn list_messages_for_chat(
        &self,
        chat_id: i64,
        after: Option<&HistoryCursor>,
    ) -> DatabaseResult<Vec<Message>> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .filter(|message| message.chat_id == chat_id)
            .filter(|message| after.map_or(true, |cursor| cursor.precedes(message)))
            .cloned()
            .collect())
    }

    async fn list_messages_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        let state = self.state.lock().await;
        Ok(state.messages_in_chats_of(user_id).cloned().collect())
    }

    async fn list_received_messages(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        let state = self.state.lock().await;
        let mut received: Vec<Message> = state
            .messages_in_chats_of(user_id)
            .filter(|message| message.sender_id != user_id)
            .cloned()
            .collect();
        received.reverse();
        Ok(received)
    }

    async fn list_chats_for_user(&self, user_id: i64) -> DatabaseResult<Vec<ChatSummary>> {
        let state = self.state.lock().await;
        let mut summaries: Vec<ChatSummary> = state
            .chats
            .iter()
            .filter(|chat| chat.participant_ids.contains(&user_id))
            .map(|chat| ChatSummary {
                chat: state.chat(chat),
                latest_message: state
                    .messages
                    .iter()
                    .rev()
                    .find(|message| message.chat_id == chat.id)
                    .cloned(),
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity().cmp(a.last_activity()));
        Ok(summaries)
    }
}
