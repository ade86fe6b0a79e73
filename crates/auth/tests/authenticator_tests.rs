use std::sync::{Arc, Mutex};

use chatline_auth::{AuthError, Authenticator, CodeSender};
use chatline_config::{AuthConfig, DatabaseConfig};
use chatline_database::initialize_database;
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Default)]
struct RecordingCodeSender {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingCodeSender {
    fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }

    fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl CodeSender for RecordingCodeSender {
    fn deliver(&self, email: &str, code: &str) -> Result<(), AuthError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    codes: Arc<RecordingCodeSender>,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 5,
        })
        .await?;

        let codes = Arc::new(RecordingCodeSender::default());
        let authenticator =
            Authenticator::new(pool.clone(), &config).with_code_sender(codes.clone());

        Ok(Self {
            pool,
            authenticator,
            codes,
            _temp_dir: temp_dir,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(AuthConfig::default()).await
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    async fn verified(&self, email: &str) -> TestResult {
        self.authenticator.request_otp(email).await?;
        let code = self.codes.last_code_for(email).ok_or("no code sent")?;
        self.authenticator.verify_otp(email, &code).await?;
        Ok(())
    }
}

#[tokio::test]
async fn request_otp_creates_unverified_user_and_stores_hashed_code() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator().request_otp("Alice@Example.com").await?;

    let code = ctx
        .codes
        .last_code_for("alice@example.com")
        .ok_or("code should be delivered to the normalised address")?;
    assert_eq!(code.len(), 6);

    let row = sqlx::query("SELECT is_verified, otp_hash, otp_expires_at FROM users WHERE email = ?")
        .bind("alice@example.com")
        .fetch_one(&ctx.pool)
        .await?;
    let verified: bool = row.get("is_verified");
    let otp_hash: String = row.get("otp_hash");
    let expires_at: Option<String> = row.get("otp_expires_at");

    assert!(!verified);
    assert!(otp_hash.starts_with("$argon2"));
    assert_ne!(otp_hash, code);
    assert!(expires_at.is_some());
    Ok(())
}

#[tokio::test]
async fn request_otp_rejects_malformed_email() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let result = ctx.authenticator().request_otp("not-an-email").await;
    assert!(matches!(result, Err(AuthError::InvalidEmail)));
    assert_eq!(ctx.codes.sent_count(), 0);
    Ok(())
}

#[tokio::test]
async fn verify_otp_marks_user_verified_and_burns_code() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().request_otp("bob@example.com").await?;
    let code = ctx.codes.last_code_for("bob@example.com").ok_or("no code")?;

    let user = ctx.authenticator().verify_otp("bob@example.com", &code).await?;
    assert!(user.is_verified);

    let reused = ctx.authenticator().verify_otp("bob@example.com", &code).await;
    assert!(matches!(reused, Err(AuthError::InvalidCode)));
    Ok(())
}

#[tokio::test]
async fn verify_otp_rejects_wrong_code() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().request_otp("carol@example.com").await?;
    let code = ctx.codes.last_code_for("carol@example.com").ok_or("no code")?;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let result = ctx.authenticator().verify_otp("carol@example.com", wrong).await;
    assert!(matches!(result, Err(AuthError::InvalidCode)));

    let user = ctx
        .authenticator()
        .users()
        .find_by_email("carol@example.com")
        .await?
        .ok_or("user should exist")?;
    assert!(!user.is_verified);
    Ok(())
}

#[tokio::test]
async fn repeated_wrong_codes_revoke_the_outstanding_code() -> TestResult {
    let ctx = TestContext::new(AuthConfig {
        otp_max_attempts: 3,
        ..AuthConfig::default()
    })
    .await?;
    ctx.authenticator().request_otp("erin@example.com").await?;
    let code = ctx.codes.last_code_for("erin@example.com").ok_or("no code")?;
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 0..3 {
        let result = ctx.authenticator().verify_otp("erin@example.com", wrong).await;
        assert!(matches!(result, Err(AuthError::InvalidCode)));
    }

    let revoked = ctx.authenticator().verify_otp("erin@example.com", &code).await;
    assert!(matches!(revoked, Err(AuthError::InvalidCode)));

    ctx.authenticator().request_otp("erin@example.com").await?;
    let fresh = ctx.codes.last_code_for("erin@example.com").ok_or("no code")?;
    let wrong = if fresh == "000000" { "111111" } else { "000000" };
    let _ = ctx.authenticator().verify_otp("erin@example.com", wrong).await;
    let user = ctx.authenticator().verify_otp("erin@example.com", &fresh).await?;
    assert!(user.is_verified);

    let attempts: i64 = sqlx::query_scalar("SELECT otp_attempts FROM users WHERE email = ?")
        .bind("erin@example.com")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(attempts, 0);
    Ok(())
}

#[tokio::test]
async fn verify_otp_rejects_expired_code() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().request_otp("dave@example.com").await?;
    let code = ctx.codes.last_code_for("dave@example.com").ok_or("no code")?;

    sqlx::query("UPDATE users SET otp_expires_at = ? WHERE email = ?")
        .bind("2000-01-01T00:00:00.000000Z")
        .bind("dave@example.com")
        .execute(&ctx.pool)
        .await?;

    let result = ctx.authenticator().verify_otp("dave@example.com", &code).await;
    assert!(matches!(result, Err(AuthError::InvalidCode)));
    Ok(())
}

#[tokio::test]
async fn verify_otp_for_unknown_user_fails() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let result = ctx
        .authenticator()
        .verify_otp("ghost@example.com", "123456")
        .await;
    assert!(matches!(result, Err(AuthError::UserNotFound)));
    Ok(())
}

#[tokio::test]
async fn signup_requires_verification() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator().request_otp("erin@example.com").await?;

    let result = ctx
        .authenticator()
        .signup("erin@example.com", "password123")
        .await;
    assert!(matches!(result, Err(AuthError::NotVerified)));
    Ok(())
}

#[tokio::test]
async fn signup_rejects_short_password_and_second_attempt() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.verified("frank@example.com").await?;

    let weak = ctx.authenticator().signup("frank@example.com", "short").await;
    assert!(matches!(weak, Err(AuthError::WeakPassword(8))));

    ctx.authenticator()
        .signup("frank@example.com", "password123")
        .await?;
    let again = ctx
        .authenticator()
        .signup("frank@example.com", "another-password")
        .await;
    assert!(matches!(again, Err(AuthError::AlreadyRegistered)));
    Ok(())
}

#[tokio::test]
async fn login_issues_token_that_resolves_to_the_user() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.verified("grace@example.com").await?;
    ctx.authenticator()
        .signup("grace@example.com", "password123")
        .await?;

    let session = ctx
        .authenticator()
        .login("GRACE@example.com", "password123")
        .await?;
    assert_eq!(session.token_type, "Bearer");

    let principal = ctx.authenticator().resolve(&session.access_token)?;
    assert_eq!(principal.user_id, session.user.public_id);
    assert_eq!(principal.email, "grace@example.com");

    let user = ctx.authenticator().current_user(&principal).await?;
    assert_eq!(user.id, session.user.id);
    Ok(())
}

#[tokio::test]
async fn login_rejects_bad_credentials_uniformly() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.verified("heidi@example.com").await?;
    ctx.authenticator()
        .signup("heidi@example.com", "password123")
        .await?;

    let wrong_password = ctx
        .authenticator()
        .login("heidi@example.com", "password124")
        .await;
    assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));

    let unknown = ctx
        .authenticator()
        .login("nobody@example.com", "password123")
        .await;
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));

    ctx.verified("ivan@example.com").await?;
    let no_password = ctx
        .authenticator()
        .login("ivan@example.com", "password123")
        .await;
    assert!(matches!(no_password, Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[tokio::test]
async fn tokens_from_another_deployment_are_rejected() -> TestResult {
    let ctx = TestContext::new_default().await?;
    let foreign = TestContext::new(AuthConfig {
        jwt_secret: "some-other-deployment-secret".into(),
        ..AuthConfig::default()
    })
    .await?;

    let user = foreign
        .authenticator()
        .provision_verified_user("judy@example.com", "password123")
        .await?;
    let token = foreign.authenticator().jwt().issue(&user.public_id, &user.email)?;

    assert!(matches!(
        ctx.authenticator().resolve(&token),
        Err(AuthError::InvalidToken(_))
    ));
    Ok(())
}

#[tokio::test]
async fn provision_verified_user_allows_immediate_login() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let user = ctx
        .authenticator()
        .provision_verified_user("demo@example.com", "password123")
        .await?;
    assert!(user.is_verified);

    let session = ctx
        .authenticator()
        .login("demo@example.com", "password123")
        .await?;
    assert_eq!(session.user.public_id, user.public_id);
    Ok(())
}
