//! In-memory repository for service tests

use chatline_database::{normalize_email, timestamp_now, DatabaseResult, User};
use tokio::sync::RwLock;

use super::user_service::UserRepo;

pub struct MockUserRepository {
    users: RwLock<Vec<User>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(&self, email: &str, verified: bool) -> User {
        let mut users = self.users.write().await;
        let id = users.len() as i64 + 1;
        let now = timestamp_now();
        let user = User {
            id,
            public_id: format!("user_{id}"),
            email: normalize_email(email),
            is_verified: verified,
            created_at: now.clone(),
            updated_at: now,
        };
        users.push(user.clone());
        user
    }
}

impl UserRepo for MockUserRepository {
    async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.public_id == public_id).cloned())
    }

    async fn list_except(&self, user_id: i64) -> DatabaseResult<Vec<User>> {
        let users = self.users.read().await;
        let mut others: Vec<User> = users.iter().filter(|u| u.id != user_id).cloned().collect();
        others.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(others)
    }
}
