//! Database migration command.
//!
//! Migrations live in `crates/bot/migrations/` and are only ever applied
//! here, never on service startup.

use saldo_bot::db;

use super::CliError;

/// Run the bot database migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = db::create_pool(&super::database_url()?).await?;

    tracing::info!("Running bot migrations...");
    sqlx::migrate!("../bot/migrations").run(&pool).await?;
    tracing::info!("Migrations complete");

    Ok(())
}
