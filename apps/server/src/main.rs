use std::sync::Arc;

use anyhow::Context;
use chatline_chats::ChatResolutionService;
use chatline_config::{load as load_config, AppConfig};
use chatline_database::{run_migrations, ChatStore, SqliteStore};
use chatline_gateway::{create_router, GatewayState};
use chatline_runtime::{telemetry, BackendServices};
use clap::{Parser, Subcommand};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

const DEMO_USERS: &[&str] = &["alice@example.com", "bob@example.com", "carol@example.com"];

#[derive(Parser)]
#[command(name = "chatline-server")]
#[command(about = "chatline backend (serves HTTP and WebSocket by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Create verified demo users and a first conversation
    SeedData {
        /// Password given to every demo user
        #[arg(long, default_value = "chatline-demo")]
        password: String,
    },
    /// Print users, chats and messages
    DumpData,
    /// Delete all chats and messages (users are kept)
    ClearData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Migrate => migrate(config).await,
        Commands::SeedData { password } => seed_data(config, &password).await,
        Commands::DumpData => dump_data(config).await,
        Commands::ClearData => clear_data(config).await,
    }
}

async fn initialise(config: &AppConfig) -> anyhow::Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!("starting chatline backend");

    let services = initialise(&config).await?;
    let state = GatewayState::new(
        services.db_pool.clone(),
        services.authenticator.clone(),
        &config,
    );
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(chatline_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

async fn migrate(config: AppConfig) -> anyhow::Result<()> {
    // initialise already migrates; running again reports an up-to-date schema.
    let services = initialise(&config).await?;
    run_migrations(&services.db_pool).await?;
    println!("Database at {} is up to date", config.database.url);
    Ok(())
}

async fn seed_data(config: AppConfig, password: &str) -> anyhow::Result<()> {
    info!("seeding database with demo data");

    let services = initialise(&config).await?;

    let mut users = Vec::with_capacity(DEMO_USERS.len());
    for email in DEMO_USERS {
        let user = services
            .authenticator
            .provision_verified_user(email, password)
            .await
            .with_context(|| format!("failed to provision {email}"))?;
        println!("- {} ({})", user.email, user.public_id);
        users.push(user);
    }

    let store = Arc::new(SqliteStore::new(services.db_pool.clone()));
    let chats = ChatResolutionService::new(store.clone());
    if let [alice, bob, ..] = users.as_slice() {
        let chat = chats
            .resolve_or_create_two_party_chat(alice, bob)
            .await
            .context("failed to open demo chat")?;
        let existing = store.list_messages_for_chat(chat.id, None).await?;
        if existing.is_empty() {
            store
                .append_message(chat.id, alice.id, "Welcome to chatline!")
                .await
                .context("failed to insert demo message")?;
        }
        println!("Demo chat {} between {} and {}", chat.public_id, alice.email, bob.email);
    }

    println!("Seeded {} users; password: {password}", users.len());
    Ok(())
}

async fn dump_data(config: AppConfig) -> anyhow::Result<()> {
    info!("dumping users, chats and messages");

    let services = initialise(&config).await?;
    let pool = &services.db_pool;

    let users = sqlx::query(
        "SELECT id, public_id, email, is_verified, password_hash IS NOT NULL AS has_password, created_at
         FROM users ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch users")?;

    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("Found {} users:", users.len());
        println!(
            "{:<5} {:<26} {:<32} {:<9} {:<9} {:<32}",
            "ID", "Public ID", "Email", "Verified", "Password", "Created At"
        );
        println!("{}", "-".repeat(118));
        for user in users {
            let id: i64 = user.get("id");
            let public_id: String = user.get("public_id");
            let email: String = user.get("email");
            let is_verified: bool = user.get("is_verified");
            let has_password: bool = user.get("has_password");
            let created_at: String = user.get("created_at");
            println!(
                "{:<5} {:<26} {:<32} {:<9} {:<9} {:<32}",
                id, public_id, email, is_verified, has_password, created_at
            );
        }
    }

    println!("\n=== CHATS ===");
    let chats = sqlx::query(
        "SELECT c.id, c.public_id, c.kind, c.name, c.created_at,
                GROUP_CONCAT(u.email, ', ') AS participants
         FROM chats c
         LEFT JOIN chat_participants p ON p.chat_id = c.id
         LEFT JOIN users u ON u.id = p.user_id
         GROUP BY c.id
         ORDER BY c.created_at ASC, c.id ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch chats")?;

    if chats.is_empty() {
        println!("No chats found in database");
    } else {
        println!("Found {} chats:", chats.len());
        println!(
            "{:<5} {:<26} {:<7} {:<20} {:<32} {}",
            "ID", "Public ID", "Kind", "Name", "Created At", "Participants"
        );
        println!("{}", "-".repeat(130));
        for chat in chats {
            let id: i64 = chat.get("id");
            let public_id: String = chat.get("public_id");
            let kind: String = chat.get("kind");
            let name: Option<String> = chat.get("name");
            let created_at: String = chat.get("created_at");
            let participants: Option<String> = chat.get("participants");
            println!(
                "{:<5} {:<26} {:<7} {:<20} {:<32} {}",
                id,
                public_id,
                kind,
                name.as_deref().unwrap_or("-"),
                created_at,
                participants.as_deref().unwrap_or("")
            );
        }
    }

    println!("\n=== MESSAGES ===");
    let messages = sqlx::query(
        "SELECT m.id, m.public_id, m.chat_id, u.email AS sender, m.content, m.created_at
         FROM messages m JOIN users u ON u.id = m.sender_id
         ORDER BY m.created_at ASC, m.id ASC",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch messages")?;

    if messages.is_empty() {
        println!("No messages found in database");
    } else {
        println!("Found {} messages:", messages.len());
        println!(
            "{:<5} {:<26} {:<8} {:<28} {:<50} {:<32}",
            "ID", "Public ID", "Chat ID", "Sender", "Content (truncated)", "Created At"
        );
        println!("{}", "-".repeat(154));
        for message in messages {
            let id: i64 = message.get("id");
            let public_id: String = message.get("public_id");
            let chat_id: i64 = message.get("chat_id");
            let sender: String = message.get("sender");
            let content: String = message.get("content");
            let created_at: String = message.get("created_at");
            println!(
                "{:<5} {:<26} {:<8} {:<28} {:<50} {:<32}",
                id,
                public_id,
                chat_id,
                sender,
                truncate(&content, 47),
                created_at
            );
        }
    }

    Ok(())
}

async fn clear_data(config: AppConfig) -> anyhow::Result<()> {
    info!("clearing chats and messages");

    let services = initialise(&config).await?;
    let mut tx = services.db_pool.begin().await?;

    let messages_deleted = sqlx::query("DELETE FROM messages")
        .execute(&mut *tx)
        .await
        .context("failed to delete messages")?;
    let chats_deleted = sqlx::query("DELETE FROM chats")
        .execute(&mut *tx)
        .await
        .context("failed to delete chats")?;
    tx.commit().await?;

    println!("Database cleared:");
    println!("- {} messages deleted", messages_deleted.rows_affected());
    println!("- {} chats deleted", chats_deleted.rows_affected());
    Ok(())
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let head: String = content.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_character_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["chatline-server"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["chatline-server", "seed-data"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::SeedData { ref password }) if password == "chatline-demo"
        ));
    }
}
