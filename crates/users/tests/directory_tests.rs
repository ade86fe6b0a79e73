use chatline_config::DatabaseConfig;
use chatline_database::{initialize_database, UserRepository};
use chatline_users::{UserError, UserService};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    users: UserRepository,
    service: UserService<UserRepository>,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("users.db").display()),
            max_connections: 4,
        })
        .await?;

        Ok(Self {
            users: UserRepository::new(pool.clone()),
            service: UserService::new(pool),
            _temp_dir: temp_dir,
        })
    }
}

#[tokio::test]
async fn directory_lists_everyone_but_the_requester() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users.find_or_create("alice@example.com").await?;
    ctx.users.find_or_create("Carol@Example.com").await?;
    ctx.users.find_or_create("bob@example.com").await?;

    let others = ctx.service.list_others(&alice.public_id).await?;
    let emails: Vec<_> = others.iter().map(|e| e.email.clone()).collect();
    assert_eq!(emails, vec!["bob@example.com", "carol@example.com"]);
    assert!(others.iter().all(|e| !e.id.is_empty() && !e.is_verified));

    let just_emails = ctx.service.list_other_emails(&alice.public_id).await?;
    assert_eq!(just_emails, emails);
    Ok(())
}

#[tokio::test]
async fn directory_rejects_unknown_requester() -> TestResult {
    let ctx = TestContext::new().await?;
    let result = ctx.service.list_others("does-not-exist").await;
    assert!(matches!(result, Err(UserError::UserNotFound)));
    Ok(())
}
