use chatline_database::User;
use serde::{Deserialize, Serialize};

/// One row of the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub email: String,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<User> for DirectoryEntry {
    fn from(user: User) -> Self {
        Self {
            id: user.public_id,
            email: user.email,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}
