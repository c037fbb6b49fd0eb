//! Inventory management commands.

use std::path::Path;

use saldo_core::CredentialPair;

use super::CliError;

/// Bulk-insert units from a `login:senha` lines file.
///
/// Malformed lines are skipped and reported, matching how operators
/// actually produce these files (copy-pasted, occasionally mangled).
pub async fn add_stock(file: &Path, announce: bool) -> Result<(), CliError> {
    let contents = tokio::fs::read_to_string(file).await?;
    let (pairs, skipped) = CredentialPair::parse_batch(&contents);
    if pairs.is_empty() {
        return Err(CliError::Invalid(format!(
            "no valid login:senha lines in {}",
            file.display()
        )));
    }

    let store = super::connect_store().await?;
    let inserted = store.add_units(&pairs).await?;
    let available = store.available_units().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Inserted {inserted} units ({skipped} malformed lines skipped)");
        println!("Available units: {available}");
    }

    if announce {
        let reached = super::broadcaster(store)?
            .stock_replenished(available)
            .await?;
        #[allow(clippy::print_stdout)]
        {
            println!("Announcement delivered to {reached} accounts");
        }
    }

    Ok(())
}

/// Delete units that have already been sold.
pub async fn remove_sold() -> Result<(), CliError> {
    let store = super::connect_store().await?;
    let removed = store.delete_sold_units().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Removed {removed} sold units");
    }
    Ok(())
}

/// Show inventory totals.
pub async fn summary() -> Result<(), CliError> {
    let store = super::connect_store().await?;
    let available = store.available_units().await?;
    let price = store.unit_price().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Available units: {available}");
        println!("Unit price: {price}");
    }
    Ok(())
}
