//! CLI command implementations.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use saldo_bot::db::{self, LedgerStore, PgLedgerStore, StoreError};
use saldo_bot::services::Broadcaster;
use saldo_bot::telegram::{ChatTransport, TelegramClient, TransportError};

pub mod migrate;
pub mod price;
pub mod stock;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database URL from `BOT_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();
    std::env::var("BOT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("BOT_DATABASE_URL"))
}

/// Connect a ledger store against the configured database.
pub async fn connect_store() -> Result<Arc<dyn LedgerStore>, CliError> {
    let pool = db::create_pool(&database_url()?).await?;
    Ok(Arc::new(PgLedgerStore::new(pool)))
}

/// Build a broadcaster over the real Telegram transport. Only needed for
/// `--announce`; commands without it never touch `TELEGRAM_BOT_TOKEN`.
pub fn broadcaster(store: Arc<dyn LedgerStore>) -> Result<Broadcaster, CliError> {
    dotenvy::dotenv().ok();
    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("TELEGRAM_BOT_TOKEN"))?;
    let transport: Arc<dyn ChatTransport> = Arc::new(TelegramClient::new(&token)?);
    Ok(Broadcaster::new(store, transport))
}
