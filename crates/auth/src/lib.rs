//! Authentication for chatline: access tokens, one-time sign-in codes and
//! password login.

use std::sync::Arc;

use chatline_config::AuthConfig;
use chatline_database::{timestamp_now, DatabaseError, User, UserRepository};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod jwt;
pub mod otp;
pub mod password;
pub mod validation;

pub use jwt::{Claims, JwtManager, Principal};
pub use otp::{CodeSender, TracingCodeSender};
pub use validation::validate_email;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing access token")]
    MissingToken,
    #[error("invalid access token: {0}")]
    InvalidToken(String),
    #[error("access token expired")]
    TokenExpired,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {0} characters")]
    WeakPassword(usize),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired code")]
    InvalidCode,
    #[error("user not found")]
    UserNotFound,
    #[error("email address has not been verified")]
    NotVerified,
    #[error("user already has a password")]
    AlreadyRegistered,
    #[error("code delivery failed: {0}")]
    Delivery(String),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store error: {0}")]
    Store(#[from] DatabaseError),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginSession {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    users: UserRepository,
    jwt: JwtManager,
    otp_ttl: Duration,
    otp_max_attempts: u32,
    code_sender: Arc<dyn CodeSender>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        let otp_ttl = Duration::seconds(i64::try_from(config.otp_ttl_seconds).unwrap_or(i64::MAX));

        Self {
            users: UserRepository::new(pool.clone()),
            pool,
            jwt: JwtManager::from_config(config),
            otp_ttl,
            otp_max_attempts: config.otp_max_attempts.max(1),
            code_sender: Arc::new(TracingCodeSender),
        }
    }

    pub fn with_code_sender(mut self, sender: Arc<dyn CodeSender>) -> Self {
        self.code_sender = sender;
        self
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Resolves a bearer token into the principal it was issued for.
    pub fn resolve(&self, token: &str) -> Result<Principal, AuthError> {
        self.jwt.resolve(token)
    }

    /// The stored user behind a resolved principal.
    pub async fn current_user(&self, principal: &Principal) -> Result<User, AuthError> {
        self.users
            .find_by_public_id(&principal.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Creates the user if needed and sends a fresh one-time code. Any code
    /// issued earlier stops working.
    pub async fn request_otp(&self, email: &str) -> Result<(), AuthError> {
        let email = validate_email(email)?;
        let user = self.users.find_or_create(&email).await?;

        let code = otp::generate_code();
        let code_hash = password::hash_secret(&code)?;
        let expires_at =
            (Utc::now() + self.otp_ttl).to_rfc3339_opts(SecondsFormat::Micros, true);

        sqlx::query(
            "UPDATE users SET otp_hash = ?, otp_expires_at = ?, otp_attempts = 0, updated_at = ?
             WHERE id = ?",
        )
        .bind(&code_hash)
        .bind(&expires_at)
        .bind(timestamp_now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        self.code_sender.deliver(&email, &code)?;
        debug!(user = %user.public_id, expires_at = %expires_at, "stored one-time code");
        Ok(())
    }

    /// Checks a one-time code, marks the user verified and burns the code.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let row = sqlx::query("SELECT otp_hash, otp_expires_at FROM users WHERE id = ?")
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;

        let stored_hash: Option<String> = row.try_get("otp_hash")?;
        let expires_at: Option<String> = row.try_get("otp_expires_at")?;
        let (Some(stored_hash), Some(expires_at)) = (stored_hash, expires_at) else {
            return Err(AuthError::InvalidCode);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidCode)?
            .with_timezone(&Utc);
        if expires_at <= Utc::now() {
            warn!(user = %user.public_id, "expired one-time code presented");
            return Err(AuthError::InvalidCode);
        }

        if !password::verify_secret(code.trim(), &stored_hash)? {
            self.record_failed_attempt(&user).await?;
            return Err(AuthError::InvalidCode);
        }

        sqlx::query(
            "UPDATE users SET is_verified = 1, otp_hash = NULL, otp_expires_at = NULL,
                 otp_attempts = 0, updated_at = ?
             WHERE id = ?",
        )
        .bind(timestamp_now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        info!(user = %user.public_id, "email verified");
        self.reload(user.id).await
    }

    /// Counts a wrong guess; the code is revoked once the limit is reached.
    async fn record_failed_attempt(&self, user: &User) -> Result<(), AuthError> {
        let attempts: i64 = sqlx::query_scalar(
            "UPDATE users SET
                 otp_attempts = otp_attempts + 1,
                 otp_hash = CASE WHEN otp_attempts + 1 >= ? THEN NULL ELSE otp_hash END,
                 otp_expires_at = CASE WHEN otp_attempts + 1 >= ? THEN NULL ELSE otp_expires_at END,
                 updated_at = ?
             WHERE id = ?
             RETURNING otp_attempts",
        )
        .bind(i64::from(self.otp_max_attempts))
        .bind(i64::from(self.otp_max_attempts))
        .bind(timestamp_now())
        .bind(user.id)
        .fetch_one(&self.pool)
        .await?;

        if attempts >= i64::from(self.otp_max_attempts) {
            warn!(user = %user.public_id, attempts, "one-time code revoked after repeated failures");
        } else {
            debug!(user = %user.public_id, attempts, "wrong one-time code");
        }
        Ok(())
    }

    /// Sets the password of a verified user who does not have one yet.
    pub async fn signup(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        password::check_password_strength(password)?;

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }

        let password_hash = password::hash_secret(password)?;
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = ?
             WHERE id = ? AND password_hash IS NULL",
        )
        .bind(&password_hash)
        .bind(timestamp_now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::AlreadyRegistered);
        }

        info!(user = %user.public_id, "password set");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, AuthError> {
        let email = validate_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(AuthError::InvalidCredentials);
        };

        let stored_hash: Option<String> = row.try_get("password_hash")?;
        let Some(stored_hash) = stored_hash else {
            return Err(AuthError::InvalidCredentials);
        };
        if !password::verify_secret(password, &stored_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.reload(row.try_get("id")?).await?;
        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }

        let access_token = self.jwt.issue(&user.public_id, &user.email)?;
        info!(user = %user.public_id, "issued access token");

        Ok(LoginSession {
            access_token,
            token_type: "Bearer",
            user,
        })
    }

    /// Creates (or updates) a verified user with a password in one step.
    /// Used for seeding demo accounts.
    pub async fn provision_verified_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = validate_email(email)?;
        password::check_password_strength(password)?;

        let user = self.users.find_or_create(&email).await?;
        let password_hash = password::hash_secret(password)?;

        sqlx::query(
            "UPDATE users SET is_verified = 1, password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&password_hash)
        .bind(timestamp_now())
        .bind(user.id)
        .execute(&self.pool)
        .await?;

        self.reload(user.id).await
    }

    async fn reload(&self, id: i64) -> Result<User, AuthError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
