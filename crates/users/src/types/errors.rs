//! Error types for the user directory.

use chatline_database::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

pub type UserResult<T> = Result<T, UserError>;
