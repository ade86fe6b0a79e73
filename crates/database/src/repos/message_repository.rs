//! Repository for message data access operations.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;

use crate::entities::{timestamp_now, HistoryCursor, Message};
use crate::types::{DatabaseError, DatabaseResult};

const MESSAGE_SELECT: &str = "SELECT m.id, m.public_id, m.chat_id, c.public_id AS chat_public_id,
        m.sender_id, u.public_id AS sender_public_id, u.email AS sender_email,
        m.content, m.created_at
     FROM messages m
     JOIN chats c ON c.id = m.chat_id
     JOIN users u ON u.id = m.sender_id";

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a message and returns the stored row.
    pub async fn create(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
    ) -> DatabaseResult<Message> {
        let public_id = cuid2::create_id();
        let now = timestamp_now();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, chat_id, sender_id, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        let message_id = result.last_insert_rowid();
        debug!(message_id, public_id = %public_id, chat_id, sender_id, "stored message");

        self.find_by_id(message_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("message {public_id}")))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        row.as_ref().map(map_message).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!("{MESSAGE_SELECT} WHERE m.public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        row.as_ref().map(map_message).transpose()
    }

    /// Messages of a chat in creation order, optionally only those after
    /// `after`.
    pub async fn list_for_chat(
        &self,
        chat_id: i64,
        after: Option<&HistoryCursor>,
    ) -> DatabaseResult<Vec<Message>> {
        let rows = match after {
            Some(HistoryCursor {
                created_at,
                message_id: Some(message_id),
            }) => {
                sqlx::query(&format!(
                    "{MESSAGE_SELECT} WHERE m.chat_id = ?
                       AND (m.created_at > ? OR (m.created_at = ? AND m.id > ?))
                     ORDER BY m.created_at ASC, m.id ASC"
                ))
                .bind(chat_id)
                .bind(created_at)
                .bind(created_at)
                .bind(message_id)
                .fetch_all(&self.pool)
                .await
            }
            Some(HistoryCursor {
                created_at,
                message_id: None,
            }) => {
                sqlx::query(&format!(
                    "{MESSAGE_SELECT} WHERE m.chat_id = ? AND m.created_at > ?
                     ORDER BY m.created_at ASC, m.id ASC"
                ))
                .bind(chat_id)
                .bind(created_at)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!(
                    "{MESSAGE_SELECT} WHERE m.chat_id = ? ORDER BY m.created_at ASC, m.id ASC"
                ))
                .bind(chat_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DatabaseError::query)?;

        rows.iter().map(map_message).collect()
    }

    /// Every message in every chat the user takes part in, oldest first.
    pub async fn list_for_participant(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{MESSAGE_SELECT}
             JOIN chat_participants p ON p.chat_id = m.chat_id
             WHERE p.user_id = ?
             ORDER BY m.created_at ASC, m.id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter().map(map_message).collect()
    }

    /// Messages others sent into the user's chats, newest first.
    pub async fn list_received_by(&self, user_id: i64) -> DatabaseResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "{MESSAGE_SELECT}
             JOIN chat_participants p ON p.chat_id = m.chat_id
             WHERE p.user_id = ? AND m.sender_id != ?
             ORDER BY m.created_at DESC, m.id DESC"
        ))
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter().map(map_message).collect()
    }

    pub async fn latest_for_chat(&self, chat_id: i64) -> DatabaseResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "{MESSAGE_SELECT} WHERE m.chat_id = ? ORDER BY m.created_at DESC, m.id DESC LIMIT 1"
        ))
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        row.as_ref().map(map_message).transpose()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }
}

fn map_message(row: &SqliteRow) -> DatabaseResult<Message> {
    Ok(Message {
        id: row.try_get("id").map_err(DatabaseError::query)?,
        public_id: row.try_get("public_id").map_err(DatabaseError::query)?,
        chat_id: row.try_get("chat_id").map_err(DatabaseError::query)?,
        chat_public_id: row.try_get("chat_public_id").map_err(DatabaseError::query)?,
        sender_id: row.try_get("sender_id").map_err(DatabaseError::query)?,
        sender_public_id: row.try_get("sender_public_id").map_err(DatabaseError::query)?,
        sender_email: row.try_get("sender_email").map_err(DatabaseError::query)?,
        content: row.try_get("content").map_err(DatabaseError::query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::query)?,
    })
}
