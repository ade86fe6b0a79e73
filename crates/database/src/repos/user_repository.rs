//! User repository for database operations.

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::entities::{normalize_email, timestamp_now, User};
use crate::types::{DatabaseError, DatabaseResult};

const USER_COLUMNS: &str = "id, public_id, email, is_verified, created_at, updated_at";

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)?;

        row.as_ref().map(map_user).transpose()
    }

    /// Returns the user with this email, creating an unverified one if needed.
    pub async fn find_or_create(&self, email: &str) -> DatabaseResult<User> {
        let email = normalize_email(email);
        let now = timestamp_now();
        let public_id = cuid2::create_id();

        let result = sqlx::query(
            "INSERT INTO users (public_id, email, is_verified, created_at, updated_at)
             VALUES (?, ?, 0, ?, ?)
             ON CONFLICT(email) DO NOTHING",
        )
        .bind(&public_id)
        .bind(&email)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        if result.rows_affected() > 0 {
            info!(public_id = %public_id, email = %email, "created user");
        }

        self.find_by_email(&email)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {email}")))
    }

    /// Every user except `user_id`, ordered by email.
    pub async fn list_except(&self, user_id: i64) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id != ? ORDER BY email ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter().map(map_user).collect()
    }

    pub async fn list_all(&self) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter().map(map_user).collect()
    }
}

fn map_user(row: &SqliteRow) -> DatabaseResult<User> {
    Ok(User {
        id: row.try_get("id").map_err(DatabaseError::query)?,
        public_id: row.try_get("public_id").map_err(DatabaseError::query)?,
        email: row.try_get("email").map_err(DatabaseError::query)?,
        is_verified: row.try_get("is_verified").map_err(DatabaseError::query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::query)?,
        updated_at: row.try_get("updated_at").map_err(DatabaseError::query)?,
    })
}
