//! Drives the real server over TCP: two clients, presence, a direct message
//! and a typing indicator.

use std::net::SocketAddr;
use std::time::Duration;

use chatline_config::AppConfig;
use chatline_gateway::{create_router, GatewayState};
use chatline_runtime::BackendServices;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;
type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    address: SocketAddr,
    services: BackendServices,
    _temp_dir: TempDir,
}

impl TestServer {
    async fn start() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", temp_dir.path().join("e2e.db").display());

        let services = BackendServices::initialise(&config).await?;
        let state = GatewayState::new(
            services.db_pool.clone(),
            services.authenticator.clone(),
            &config,
        );
        let app = create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            address,
            services,
            _temp_dir: temp_dir,
        })
    }

    async fn token_for(&self, email: &str) -> TestResult<String> {
        let user = self
            .services
            .authenticator
            .provision_verified_user(email, "a perfectly fine password")
            .await?;
        Ok(self
            .services
            .authenticator
            .jwt()
            .issue(&user.public_id, &user.email)?)
    }

    async fn connect(&self, token: &str) -> TestResult<Client> {
        let url = format!("ws://{}/ws?token={token}", self.address);
        let (client, _) = connect_async(url).await?;
        Ok(client)
    }
}

async fn next_event(client: &mut Client) -> TestResult<Value> {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await?
            .ok_or("connection closed")??;
        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

async fn send(client: &mut Client, event: Value) -> TestResult {
    client.send(Message::Text(event.to_string())).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn two_clients_exchange_presence_messages_and_typing() -> TestResult {
    let server = TestServer::start().await?;
    let alice_token = server.token_for("alice@example.com").await?;
    let bob_token = server.token_for("bob@example.com").await?;

    let mut alice = server.connect(&alice_token).await?;
    let hello = next_event(&mut alice).await?;
    assert_eq!(hello["type"], "hello");
    assert_eq!(hello["email"], "alice@example.com");
    let snapshot = next_event(&mut alice).await?;
    assert_eq!(snapshot["type"], "presence_snapshot");
    assert_eq!(snapshot["entries"].as_array().map(Vec::len), Some(1));

    let mut bob = server.connect(&bob_token).await?;
    assert_eq!(next_event(&mut bob).await?["type"], "hello");
    let snapshot = next_event(&mut bob).await?;
    let emails: Vec<&str> = snapshot["entries"]
        .as_array()
        .ok_or("no entries")?
        .iter()
        .filter_map(|entry| entry["email"].as_str())
        .collect();
    assert_eq!(emails, ["alice@example.com", "bob@example.com"]);

    let online = next_event(&mut alice).await?;
    assert_eq!(online["type"], "user_online");
    assert_eq!(online["email"], "bob@example.com");

    send(
        &mut alice,
        json!({ "type": "send_message", "to_email": "bob@example.com", "content": "hi bob" }),
    )
    .await?;

    let delivered = next_event(&mut bob).await?;
    assert_eq!(delivered["type"], "message_delivered");
    assert_eq!(delivered["message"]["content"], "hi bob");
    assert_eq!(delivered["message"]["sender_email"], "alice@example.com");

    let echo = next_event(&mut alice).await?;
    assert_eq!(echo["type"], "message_delivered");
    assert_eq!(echo["message"]["message_id"], delivered["message"]["message_id"]);

    send(&mut alice, json!({ "type": "typing", "to_email": "bob@example.com" })).await?;
    let typing = next_event(&mut bob).await?;
    assert_eq!(typing["type"], "typing");
    assert_eq!(typing["from_email"], "alice@example.com");

    send(&mut alice, json!({ "type": "ping" })).await?;
    assert_eq!(next_event(&mut alice).await?["type"], "pong");

    bob.close(None).await?;
    let offline = next_event(&mut alice).await?;
    assert_eq!(offline["type"], "user_offline");
    assert_eq!(offline["email"], "bob@example.com");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_frames_and_rejected_sends_keep_the_connection_open() -> TestResult {
    let server = TestServer::start().await?;
    let token = server.token_for("alice@example.com").await?;

    let mut alice = server.connect(&token).await?;
    next_event(&mut alice).await?;
    next_event(&mut alice).await?;

    alice.send(Message::Text("{not json".to_string())).await?;
    let error = next_event(&mut alice).await?;
    assert_eq!(error["type"], "error");
    assert_eq!(error["code"], "invalid_event");

    send(
        &mut alice,
        json!({
            "type": "send_message",
            "to_email": "ghost@example.com",
            "content": "anyone there?",
            "request_id": "req-7"
        }),
    )
    .await?;
    let error = next_event(&mut alice).await?;
    assert_eq!(error["code"], "recipient_not_found");
    assert_eq!(error["request_id"], "req-7");

    send(&mut alice, json!({ "type": "ping" })).await?;
    assert_eq!(next_event(&mut alice).await?["type"], "pong");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn handshake_without_a_valid_token_is_refused() -> TestResult {
    let server = TestServer::start().await?;

    let url = format!("ws://{}/ws", server.address);
    assert!(connect_async(url).await.is_err());

    let url = format!("ws://{}/ws?token=forged", server.address);
    assert!(connect_async(url).await.is_err());
    Ok(())
}
