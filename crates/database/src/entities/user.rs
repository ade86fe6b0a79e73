//! User entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Emails are stored trimmed and lowercased; lookups go through the same
/// normalisation.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
