//! Repository for chat data access operations.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

use super::MessageRepository;
use crate::entities::{
    pair_key, timestamp_now, Chat, ChatKind, ChatParticipant, ChatSummary, CreateChatRequest,
};
use crate::types::{DatabaseError, DatabaseResult};

const CHAT_COLUMNS: &str = "id, public_id, kind, name, created_at";

/// Repository for chat database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
    messages: MessageRepository,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            messages: MessageRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// The two-party chat between `user_a` and `user_b`, in either order.
    pub async fn find_direct(&self, user_a: i64, user_b: i64) -> DatabaseResult<Option<Chat>> {
        let row = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats WHERE pair_key = ?"
        ))
        .bind(pair_key(user_a, user_b))
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    /// Creates a chat. For a direct chat the insert is keyed on the unique
    /// `pair_key`, so concurrent callers for the same pair all end up with
    /// the single row that won.
    pub async fn create(&self, request: &CreateChatRequest) -> DatabaseResult<Chat> {
        match request {
            CreateChatRequest::Direct { user_a, user_b } => {
                self.create_direct(*user_a, *user_b).await
            }
            CreateChatRequest::Group {
                name,
                participant_ids,
            } => self.create_group(name, participant_ids).await,
        }
    }

    async fn create_direct(&self, user_a: i64, user_b: i64) -> DatabaseResult<Chat> {
        let key = pair_key(user_a, user_b);
        let public_id = cuid2::create_id();
        let now = timestamp_now();

        let mut tx = self.pool.begin().await.map_err(DatabaseError::query)?;

        let result = sqlx::query(
            "INSERT INTO chats (public_id, kind, name, pair_key, created_at)
             VALUES (?, 'direct', NULL, ?, ?)
             ON CONFLICT(pair_key) DO NOTHING",
        )
        .bind(&public_id)
        .bind(&key)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            let chat_id = result.last_insert_rowid();
            for user_id in [user_a, user_b] {
                sqlx::query(
                    "INSERT INTO chat_participants (chat_id, user_id, joined_at) VALUES (?, ?, ?)",
                )
                .bind(chat_id)
                .bind(user_id)
                .bind(&now)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
            }
        }

        tx.commit().await.map_err(DatabaseError::query)?;

        let chat = self
            .find_direct(user_a, user_b)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("direct chat {key}")))?;

        if inserted {
            info!(chat = %chat.public_id, pair = %key, "created direct chat");
        } else {
            debug!(chat = %chat.public_id, pair = %key, "direct chat already existed");
        }

        Ok(chat)
    }

    async fn create_group(&self, name: &str, participant_ids: &[i64]) -> DatabaseResult<Chat> {
        let public_id = cuid2::create_id();
        let now = timestamp_now();

        let mut tx = self.pool.begin().await.map_err(DatabaseError::query)?;

        let result = sqlx::query(
            "INSERT INTO chats (public_id, kind, name, pair_key, created_at)
             VALUES (?, 'group', ?, NULL, ?)",
        )
        .bind(&public_id)
        .bind(name)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;

        let chat_id = result.last_insert_rowid();
        for user_id in participant_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO chat_participants (chat_id, user_id, joined_at) VALUES (?, ?, ?)",
            )
            .bind(chat_id)
            .bind(user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?;
        }

        tx.commit().await.map_err(DatabaseError::query)?;

        info!(chat = %public_id, members = participant_ids.len(), "created group chat");

        self.find_by_id(chat_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("chat {public_id}")))
    }

    /// Adds a participant. Returns `false` when the user already belonged to
    /// the chat.
    pub async fn add_participant(&self, chat_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO chat_participants (chat_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(timestamp_now())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        Ok(result.rows_affected() > 0)
    }

    /// Chats the user participates in, most recently active first.
    pub async fn list_for_user(&self, user_id: i64) -> DatabaseResult<Vec<ChatSummary>> {
        let rows = sqlx::query(
            "SELECT c.id, c.public_id, c.kind, c.name, c.created_at
             FROM chats c
             JOIN chat_participants p ON p.chat_id = c.id
             WHERE p.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat = self.hydrate(row).await?;
            let latest_message = self.messages.latest_for_chat(chat.id).await?;
            summaries.push(ChatSummary {
                chat,
                latest_message,
            });
        }

        summaries.sort_by(|a, b| b.last_activity().cmp(a.last_activity()));
        Ok(summaries)
    }

    pub async fn list_all(&self) -> DatabaseResult<Vec<Chat>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chats ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(self.hydrate(row).await?);
        }
        Ok(chats)
    }

    async fn hydrate(&self, row: &SqliteRow) -> DatabaseResult<Chat> {
        let id: i64 = row.try_get("id").map_err(DatabaseError::query)?;
        let kind: String = row.try_get("kind").map_err(DatabaseError::query)?;

        Ok(Chat {
            id,
            public_id: row.try_get("public_id").map_err(DatabaseError::query)?,
            kind: ChatKind::from(kind.as_str()),
            name: row.try_get("name").map_err(DatabaseError::query)?,
            participants: self.participants(id).await?,
            created_at: row.try_get("created_at").map_err(DatabaseError::query)?,
        })
    }

    async fn participants(&self, chat_id: i64) -> DatabaseResult<Vec<ChatParticipant>> {
        let rows = sqlx::query(
            "SELECT u.id, u.public_id, u.email
             FROM chat_participants p
             JOIN users u ON u.id = p.user_id
             WHERE p.chat_id = ?
             ORDER BY p.joined_at ASC, u.id ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter()
            .map(|row| {
                Ok(ChatParticipant {
                    user_id: row.try_get("id").map_err(DatabaseError::query)?,
                    public_id: row.try_get("public_id").map_err(DatabaseError::query)?,
                    email: row.try_get("email").map_err(DatabaseError::query)?,
                })
            })
            .collect()
    }
}
