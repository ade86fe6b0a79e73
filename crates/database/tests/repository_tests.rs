use std::collections::HashSet;

use chatline_config::DatabaseConfig;
use chatline_database::{
    initialize_database, Chat, ChatKind, ChatRepository, ChatStore, CreateChatRequest,
    HistoryCursor, Message, MessageRepository, SqliteStore, User, UserRepository,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("repositories.sqlite");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 8,
        };

        let pool = initialize_database(&config).await?;

        Ok(Self {
            pool,
            _temp_dir: temp_dir,
        })
    }

    fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    fn chats(&self) -> ChatRepository {
        ChatRepository::new(self.pool.clone())
    }

    fn messages(&self) -> MessageRepository {
        MessageRepository::new(self.pool.clone())
    }

    async fn verified_user(&self, email: &str) -> TestResult<User> {
        let user = self.users().find_or_create(email).await?;
        sqlx::query("UPDATE users SET is_verified = 1 WHERE id = ?")
            .bind(user.id)
            .execute(&self.pool)
            .await?;
        Ok(self.users().find_by_id(user.id).await?.ok_or("user vanished")?)
    }

    async fn chat_rows(&self) -> TestResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chats")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[tokio::test]
async fn find_or_create_normalises_email_and_is_idempotent() -> TestResult {
    let ctx = TestContext::new().await?;

    let first = ctx.users().find_or_create("  Alice@Example.COM ").await?;
    let second = ctx.users().find_or_create("alice@example.com").await?;

    assert_eq!(first.id, second.id);
    assert_eq!(first.email, "alice@example.com");
    assert!(!first.is_verified);

    let by_email = ctx.users().find_by_email("ALICE@example.com").await?;
    assert_eq!(by_email.map(|user| user.public_id), Some(first.public_id));
    Ok(())
}

#[tokio::test]
async fn list_except_omits_the_requesting_user() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users().find_or_create("alice@example.com").await?;
    ctx.users().find_or_create("bob@example.com").await?;
    ctx.users().find_or_create("carol@example.com").await?;

    let others = ctx.users().list_except(alice.id).await?;
    let emails: Vec<_> = others.iter().map(|user| user.email.as_str()).collect();
    assert_eq!(emails, ["bob@example.com", "carol@example.com"]);
    Ok(())
}

#[tokio::test]
async fn direct_chat_creation_is_order_independent() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;

    let forward = ctx
        .chats()
        .create(&CreateChatRequest::Direct {
            user_a: alice.id,
            user_b: bob.id,
        })
        .await?;
    let backward = ctx
        .chats()
        .create(&CreateChatRequest::Direct {
            user_a: bob.id,
            user_b: alice.id,
        })
        .await?;

    assert_eq!(forward.public_id, backward.public_id);
    assert_eq!(forward.kind, ChatKind::Direct);
    assert_eq!(forward.participants.len(), 2);
    assert!(forward.is_participant(alice.id) && forward.is_participant(bob.id));
    assert_eq!(ctx.chat_rows().await?, 1);

    let found = ctx.chats().find_direct(bob.id, alice.id).await?;
    assert_eq!(found.map(|chat| chat.id), Some(forward.id));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_direct_chat_creation_leaves_one_row() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;

    let mut handles = Vec::new();
    for attempt in 0..8 {
        let store = SqliteStore::new(ctx.pool.clone());
        let (user_a, user_b) = if attempt % 2 == 0 {
            (alice.id, bob.id)
        } else {
            (bob.id, alice.id)
        };
        handles.push(tokio::spawn(async move {
            store
                .create_chat(CreateChatRequest::Direct { user_a, user_b })
                .await
        }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.await??.public_id);
    }

    assert_eq!(ids.len(), 1, "every caller must observe the same chat");
    assert_eq!(ctx.chat_rows().await?, 1);

    let participants: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_participants")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(participants, 2);
    Ok(())
}

#[tokio::test]
async fn group_chats_do_not_collide_with_direct_pairs() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let carol = ctx.verified_user("carol@example.com").await?;

    ctx.chats()
        .create(&CreateChatRequest::Direct {
            user_a: alice.id,
            user_b: bob.id,
        })
        .await?;
    let group = ctx
        .chats()
        .create(&CreateChatRequest::Group {
            name: "weekend".into(),
            participant_ids: vec![alice.id, bob.id],
        })
        .await?;

    assert_eq!(group.kind, ChatKind::Group);
    assert_eq!(group.name.as_deref(), Some("weekend"));
    assert_eq!(ctx.chat_rows().await?, 2);

    assert!(ctx.chats().add_participant(group.id, carol.id).await?);
    assert!(!ctx.chats().add_participant(group.id, carol.id).await?);

    let reloaded = ctx
        .chats()
        .find_by_public_id(&group.public_id)
        .await?
        .ok_or("group missing")?;
    assert_eq!(reloaded.participants.len(), 3);
    Ok(())
}

#[tokio::test]
async fn messages_are_listed_in_creation_order_and_filtered_by_after() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let chat = ctx
        .chats()
        .create(&CreateChatRequest::Direct {
            user_a: alice.id,
            user_b: bob.id,
        })
        .await?;

    let mut sent = Vec::new();
    for (index, sender) in [&alice, &bob, &alice, &bob, &alice].iter().enumerate() {
        let message = ctx
            .messages()
            .create(chat.id, sender.id, &format!("message {index}"))
            .await?;
        sent.push(message);
    }

    let history = ctx.messages().list_for_chat(chat.id, None).await?;
    assert_eq!(history.len(), 5);
    for (stored, expected) in history.iter().zip(&sent) {
        assert_eq!(stored.public_id, expected.public_id);
        assert_eq!(stored.sender_id, expected.sender_id);
        assert_eq!(stored.content, expected.content);
        assert_eq!(stored.chat_public_id, chat.public_id);
    }
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));

    let tail = ctx
        .messages()
        .list_for_chat(chat.id, Some(&HistoryCursor::after_message(&sent[2])))
        .await?;
    let tail_ids: Vec<&str> = tail.iter().map(|m| m.public_id.as_str()).collect();
    assert_eq!(tail_ids, [sent[3].public_id.as_str(), sent[4].public_id.as_str()]);
    Ok(())
}

impl TestContext {
    async fn direct_chat(&self, a: &User, b: &User) -> TestResult<Chat> {
        Ok(self
            .chats()
            .create(&CreateChatRequest::Direct {
                user_a: a.id,
                user_b: b.id,
            })
            .await?)
    }

    async fn message_at(
        &self,
        chat: &Chat,
        sender: &User,
        content: &str,
        created_at: &str,
    ) -> TestResult<Message> {
        let message = self.messages().create(chat.id, sender.id, content).await?;
        sqlx::query("UPDATE messages SET created_at = ? WHERE id = ?")
            .bind(created_at)
            .bind(message.id)
            .execute(&self.pool)
            .await?;
        Ok(self
            .messages()
            .find_by_id(message.id)
            .await?
            .ok_or("message vanished")?)
    }
}

async fn count_after(
    messages: &MessageRepository,
    chat_id: i64,
    timestamp: &str,
) -> TestResult<usize> {
    let cursor = HistoryCursor::since(timestamp).ok_or("timestamp did not parse")?;
    Ok(messages.list_for_chat(chat_id, Some(&cursor)).await?.len())
}

#[tokio::test]
async fn after_filter_compares_instants_not_strings() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let chat = ctx.direct_chat(&alice, &bob).await?;
    ctx.message_at(&chat, &alice, "late in the second", "2026-10-18T10:47:41.383237Z")
        .await?;

    let messages = ctx.messages();
    assert_eq!(count_after(&messages, chat.id, "2026-10-18T10:47:41Z").await?, 1);
    assert_eq!(count_after(&messages, chat.id, "2026-10-18T14:47:41.383237+05:00").await?, 1);
    assert_eq!(count_after(&messages, chat.id, "2026-10-18T10:47:41.383237Z").await?, 0);
    assert_eq!(count_after(&messages, chat.id, "2026-10-18T12:47:41+02:00").await?, 1);
    assert_eq!(count_after(&messages, chat.id, "2026-10-18T12:47:42+02:00").await?, 0);
    assert!(HistoryCursor::since("yesterday").is_none());
    Ok(())
}

#[tokio::test]
async fn message_cursor_keeps_messages_sharing_a_timestamp() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let chat = ctx.direct_chat(&alice, &bob).await?;

    let instant = "2026-10-18T10:47:41.000001Z";
    let first = ctx.message_at(&chat, &alice, "one", instant).await?;
    let second = ctx.message_at(&chat, &bob, "two", instant).await?;

    let by_time = ctx
        .messages()
        .list_for_chat(chat.id, HistoryCursor::since(instant).as_ref())
        .await?;
    assert!(by_time.is_empty());

    let by_message = ctx
        .messages()
        .list_for_chat(chat.id, Some(&HistoryCursor::after_message(&first)))
        .await?;
    assert_eq!(by_message.len(), 1);
    assert_eq!(by_message[0].public_id, second.public_id);
    Ok(())
}

#[tokio::test]
async fn cross_chat_listings_cover_only_the_users_chats() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let carol = ctx.verified_user("carol@example.com").await?;
    let with_bob = ctx.direct_chat(&alice, &bob).await?;
    let with_carol = ctx.direct_chat(&alice, &carol).await?;
    let bob_carol = ctx.direct_chat(&bob, &carol).await?;

    ctx.message_at(&with_bob, &alice, "a1", "2026-10-18T10:00:00.000000Z").await?;
    ctx.message_at(&with_carol, &carol, "c1", "2026-10-18T10:00:01.000000Z").await?;
    ctx.message_at(&bob_carol, &bob, "private", "2026-10-18T10:00:02.000000Z").await?;
    ctx.message_at(&with_bob, &bob, "b1", "2026-10-18T10:00:03.000000Z").await?;

    let store = SqliteStore::new(ctx.pool.clone());
    let all: Vec<String> = store
        .list_messages_for_user(alice.id)
        .await?
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(all, ["a1", "c1", "b1"]);

    let received: Vec<String> = store
        .list_received_messages(alice.id)
        .await?
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(received, ["b1", "c1"]);

    let first = &ctx.messages().list_for_chat(with_bob.id, None).await?[0];
    let found = store.find_message(&first.public_id).await?;
    assert_eq!(found.map(|m| m.content).as_deref(), Some("a1"));
    Ok(())
}

#[tokio::test]
async fn appending_to_a_missing_chat_fails() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;

    let result = ctx.messages().create(9_999, alice.id, "into the void").await;
    assert!(result.is_err());
    assert_eq!(ctx.messages().count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn chat_summaries_carry_latest_message_and_sort_by_activity() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.verified_user("alice@example.com").await?;
    let bob = ctx.verified_user("bob@example.com").await?;
    let carol = ctx.verified_user("carol@example.com").await?;

    let with_bob = ctx
        .chats()
        .create(&CreateChatRequest::Direct {
            user_a: alice.id,
            user_b: bob.id,
        })
        .await?;
    let with_carol = ctx
        .chats()
        .create(&CreateChatRequest::Direct {
            user_a: alice.id,
            user_b: carol.id,
        })
        .await?;

    ctx.messages().create(with_carol.id, carol.id, "first").await?;
    ctx.messages().create(with_bob.id, bob.id, "second").await?;

    let summaries = ctx.chats().list_for_user(alice.id).await?;
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].chat.public_id, with_bob.public_id);
    assert_eq!(
        summaries[0]
            .latest_message
            .as_ref()
            .map(|message| message.content.as_str()),
        Some("second")
    );

    let bobs = ctx.chats().list_for_user(bob.id).await?;
    assert_eq!(bobs.len(), 1);
    Ok(())
}
