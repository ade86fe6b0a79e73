//! User directory service.

use std::future::Future;

use chatline_database::{DatabaseResult, User, UserRepository};
use sqlx::SqlitePool;
use tracing::debug;

use crate::types::{DirectoryEntry, UserError, UserResult};

/// Service for directory lookups
#[derive(Clone)]
pub struct UserService<R> {
    user_repository: R,
}

impl UserService<UserRepository> {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_repository(UserRepository::new(pool))
    }
}

impl<R> UserService<R>
where
    R: UserRepo,
{
    pub fn with_repository(user_repository: R) -> Self {
        Self { user_repository }
    }

    /// Get a user by public ID
    pub async fn profile(&self, public_id: &str) -> UserResult<User> {
        self.user_repository
            .find_by_public_id(public_id)
            .await?
            .ok_or(UserError::UserNotFound)
    }

    /// Everyone except the requester, ordered by email.
    pub async fn list_others(&self, public_id: &str) -> UserResult<Vec<DirectoryEntry>> {
        let me = self.profile(public_id).await?;
        let others = self.user_repository.list_except(me.id).await?;
        debug!(user = %me.public_id, count = others.len(), "listed directory");
        Ok(others.into_iter().map(DirectoryEntry::from).collect())
    }

    pub async fn list_other_emails(&self, public_id: &str) -> UserResult<Vec<String>> {
        let me = self.profile(public_id).await?;
        let others = self.user_repository.list_except(me.id).await?;
        Ok(others.into_iter().map(|user| user.email).collect())
    }
}

/// Trait for user repositories to allow generic usage
pub trait UserRepo: Send + Sync {
    fn find_by_public_id(
        &self,
        public_id: &str,
    ) -> impl Future<Output = DatabaseResult<Option<User>>> + Send;

    fn list_except(&self, user_id: i64) -> impl Future<Output = DatabaseResult<Vec<User>>> + Send;
}

impl UserRepo for UserRepository {
    async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        UserRepository::find_by_public_id(self, public_id).await
    }

    async fn list_except(&self, user_id: i64) -> DatabaseResult<Vec<User>> {
        UserRepository::list_except(self, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock_repositories::MockUserRepository;

    async fn service_with(emails: &[(&str, bool)]) -> (UserService<MockUserRepository>, Vec<User>) {
        let repo = MockUserRepository::new();
        let mut users = Vec::new();
        for (email, verified) in emails {
            users.push(repo.insert(email, *verified).await);
        }
        (UserService::with_repository(repo), users)
    }

    #[tokio::test]
    async fn test_profile_found() {
        let (service, users) = service_with(&[("alice@example.com", true)]).await;
        let profile = service.profile(&users[0].public_id).await.unwrap();
        assert_eq!(profile.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_profile_not_found() {
        let (service, _) = service_with(&[]).await;
        assert!(matches!(
            service.profile("missing").await,
            Err(UserError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_others_excludes_requester() {
        let (service, users) = service_with(&[
            ("carol@example.com", false),
            ("alice@example.com", true),
            ("bob@example.com", true),
        ])
        .await;

        let others = service.list_others(&users[1].public_id).await.unwrap();
        let emails: Vec<_> = others.iter().map(|entry| entry.email.as_str()).collect();
        assert_eq!(emails, vec!["bob@example.com", "carol@example.com"]);
        assert!(!others[1].is_verified);
    }

    #[tokio::test]
    async fn test_list_other_emails() {
        let (service, users) =
            service_with(&[("alice@example.com", true), ("bob@example.com", true)]).await;

        let emails = service.list_other_emails(&users[1].public_id).await.unwrap();
        assert_eq!(emails, vec!["alice@example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_requester_cannot_list() {
        let (service, _) = service_with(&[("alice@example.com", true)]).await;
        assert!(matches!(
            service.list_others("ghost").await,
            Err(UserError::UserNotFound)
        ));
    }
}
