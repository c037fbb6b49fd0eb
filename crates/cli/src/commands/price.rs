//! Pricing command.

use saldo_core::Money;

use super::CliError;

/// Set the unit price. Accepts `0.70` or `0,70`.
pub async fn set_price(input: &str, announce: bool) -> Result<(), CliError> {
    let price = Money::parse_user_input(input)
        .map_err(|e| CliError::Invalid(format!("price {input:?}: {e}")))?;
    if price.is_zero() {
        return Err(CliError::Invalid("price must be greater than zero".to_owned()));
    }

    let store = super::connect_store().await?;
    store.set_unit_price(price).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("Unit price set to {price}");
    }

    if announce {
        let reached = super::broadcaster(store)?.price_changed(price).await?;
        #[allow(clippy::print_stdout)]
        {
            println!("Announcement delivered to {reached} accounts");
        }
    }

    Ok(())
}
