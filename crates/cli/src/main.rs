//! Saldo CLI - Database migrations and inventory management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! saldo-cli migrate
//!
//! # Bulk-load inventory from a login:senha lines file, announcing it
//! saldo-cli add-stock ./contas.txt --announce
//!
//! # Delete units that have already been sold
//! saldo-cli remove-sold
//!
//! # Change the unit price (accepts 0.70 or 0,70)
//! saldo-cli set-price 0,70 --announce
//!
//! # Show inventory totals
//! saldo-cli stock
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "saldo-cli")]
#[command(author, version, about = "Saldo CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Bulk-insert inventory units from a login:senha lines file
    AddStock {
        /// Path to the credentials file
        file: std::path::PathBuf,

        /// Broadcast a stock-replenished announcement afterwards
        #[arg(long)]
        announce: bool,
    },
    /// Delete units that have already been sold
    RemoveSold,
    /// Set the unit price
    SetPrice {
        /// New price, `0.70` or `0,70`
        price: String,

        /// Broadcast a price-change announcement afterwards
        #[arg(long)]
        announce: bool,
    },
    /// Show inventory totals
    Stock,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::AddStock { file, announce } => {
            commands::stock::add_stock(&file, announce).await?;
        }
        Commands::RemoveSold => commands::stock::remove_sold().await?,
        Commands::SetPrice { price, announce } => {
            commands::price::set_price(&price, announce).await?;
        }
        Commands::Stock => commands::stock::summary().await?,
    }
    Ok(())
}
