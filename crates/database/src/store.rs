//! The persistence capabilities the chat core depends on.
//!
//! [`ChatStore`] is the seam between the realtime/chat services and the
//! durable store. [`SqliteStore`] backs it with the repositories in this
//! crate.

use std::future::Future;

use sqlx::SqlitePool;

use crate::entities::{Chat, ChatSummary, CreateChatRequest, HistoryCursor, Message, User};
use crate::repos::{ChatRepository, MessageRepository, UserRepository};
use crate::types::DatabaseResult;

pub trait ChatStore: Send + Sync + 'static {
    /// Looks a user up by public id.
    fn find_user_by_id(
        &self,
        public_id: &str,
    ) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;

    /// The chat whose participant set is exactly `{user_a, user_b}`.
    fn find_two_party_chat(
        &self,
        user_a: i64,
        user_b: i64,
    ) -> impl Future<Output = DatabaseResult<Option<Chat>>> + Send;

    /// Creates a chat. Direct chats must be created atomically: concurrent
    /// calls for the same pair return the same chat and leave one row.
    fn create_chat(
        &self,
        request: CreateChatRequest,
    ) -> impl Future<Output = DatabaseResult<Chat>> + Send;

    fn find_chat(
        &self,
        public_id: &str,
    ) -> impl Future<Output = DatabaseResult<Option<Chat>>> + Send;

    fn add_participant(
        &self,
        chat_id: i64,
        user_id: i64,
    ) -> impl Future<Output = DatabaseResult<bool>> + Send;

    fn append_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
    ) -> impl Future<Output = DatabaseResult<Message>> + Send;

    fn find_message(
        &self,
        public_id: &str,
    ) -> impl Future<Output = DatabaseResult<Option<Message>>> + Send;

    /// Ordered by creation time ascending, ties broken by insertion order.
    fn list_messages_for_chat(
        &self,
        chat_id: i64,
        after: Option<&HistoryCursor>,
    ) -> impl Future<Output = DatabaseResult<Vec<Message>>> + Send;

    /// Messages across all of the user's chats, oldest first.
    fn list_messages_for_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = DatabaseResult<Vec<Message>>> + Send;

    /// Messages in the user's chats sent by someone else, newest first.
    fn list_received_messages(
        &self,
        user_id: i64,
    ) -> impl Future<Output = DatabaseResult<Vec<Message>>> + Send;

    fn list_chats_for_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = DatabaseResult<Vec<ChatSummary>>> + Send;
}

#[derive(Clone)]
pub struct SqliteStore {
    users: UserRepository,
    chats: ChatRepository,
    messages: MessageRepository,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            chats: ChatRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn chats(&self) -> &ChatRepository {
        &self.chats
    }

    pub fn messages(&self) -> &MessageRepository {
        &self.messages
    }
}

impl ChatStore for SqliteStore {
    async fn find_user_by_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        self.users.find_by_public_id(public_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        self.users.find_by_email(email).await
    }

    async fn find_two_party_chat(&self, user_a: i64, user_b: i64) -> DatabaseResult<Option<Chat>> {
        self.chats.find_direct(user_a, user_b).await
    }

    async fn create_chat(&self, request: CreateChatRequest) -> DatabaseResult<Chat> {
        self.chats.create(&request).await
    }

    async fn find_chat(&self, public_id: &str) -> DatabaseResult<Option<Chat>> {
        self.chats.find_by_public_id(public_id).await
    }

    async fn add_participant(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        self.chats.add_participant(chat_id, user_id).await
    }

    async fn append_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
    ) -> DatabaseResult<Message> {
        self.messages.create(chat_id, sender_id, content).await
    }

    async fn find_message(&self, public_id: &str) -> DatabaseResult<Option<Message>> {
        self.messages.find_by_public_id(public_id).await
    }

    async fn list_messages_for_chat(
        &self,
        chat_id: i64,
        after: Option<&HistoryCursor>,
    ) -> DatabaseResult<Vec<Message>> {
        self.messages.list_for_chat(chat_id, after).await
    }

    async fn list_messages_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        self.messages.list_for_participant(user_id).await
    }

    async fn list_received_messages(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        self.messages.list_received_by(user_id).await
    }

    async fn list_chats_for_user(&self, user_id: i64) -> DatabaseResult<Vec<ChatSummary>> {
        self.chats.list_for_user(user_id).await
    }
}
