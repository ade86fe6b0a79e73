//! Error types for the gateway layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatline_auth::AuthError;
use chatline_chats::ChatError;
use chatline_database::DatabaseError;
use chatline_realtime::RouterError;
use chatline_users::UserError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let error_response = json!({
            "error": status.as_str(),
            "message": self.to_string(),
        });

        (status, Json(error_response)).into_response()
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::MissingToken
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => GatewayError::AuthenticationFailed(error.to_string()),
            AuthError::InvalidEmail | AuthError::WeakPassword(_) | AuthError::InvalidCode => {
                GatewayError::InvalidRequest(error.to_string())
            }
            AuthError::NotVerified => GatewayError::Forbidden(error.to_string()),
            AuthError::UserNotFound => GatewayError::NotFound(error.to_string()),
            AuthError::AlreadyRegistered => GatewayError::Conflict(error.to_string()),
            AuthError::Delivery(_) => GatewayError::ServiceUnavailable(error.to_string()),
            AuthError::PasswordHash(_) | AuthError::TokenEncoding(_) => {
                GatewayError::InternalError(error.to_string())
            }
            AuthError::Database(_) | AuthError::Store(_) => {
                GatewayError::ServiceUnavailable(error.to_string())
            }
        }
    }
}

impl From<UserError> for GatewayError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::UserNotFound => GatewayError::NotFound("User not found".to_string()),
            UserError::Database(err) => err.into(),
        }
    }
}

impl From<ChatError> for GatewayError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::RequesterNotFound => GatewayError::AuthenticationFailed(error.to_string()),
            ChatError::RecipientNotFound(_) | ChatError::ChatNotFound(_) => {
                GatewayError::NotFound(error.to_string())
            }
            ChatError::NotParticipant => GatewayError::Forbidden(error.to_string()),
            ChatError::RecipientUnverified(_)
            | ChatError::SelfChat
            | ChatError::NotAGroup
            | ChatError::InvalidInput(_) => GatewayError::Unprocessable(error.to_string()),
            ChatError::Store(err) => err.into(),
        }
    }
}

impl From<RouterError> for GatewayError {
    fn from(error: RouterError) -> Self {
        match error {
            RouterError::SenderUnverified | RouterError::NotParticipant => {
                GatewayError::Forbidden(error.to_string())
            }
            RouterError::RecipientNotFound(_) | RouterError::ChatNotFound(_) => {
                GatewayError::NotFound(error.to_string())
            }
            RouterError::RecipientUnverified(_)
            | RouterError::InvalidContent(_)
            | RouterError::SelfMessage => GatewayError::Unprocessable(error.to_string()),
            RouterError::StoreUnavailable(_) => GatewayError::ServiceUnavailable(error.to_string()),
        }
    }
}

impl From<DatabaseError> for GatewayError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(message) => GatewayError::NotFound(message),
            DatabaseError::Duplicate(message) => GatewayError::Conflict(message),
            other => GatewayError::ServiceUnavailable(other.to_string()),
        }
    }
}
