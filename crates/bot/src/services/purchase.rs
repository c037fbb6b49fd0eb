//! Purchase orchestration.
//!
//! The one multi-step financial flow in the system. Ordering is fixed:
//! debit first, then claim, then mark sold, then deliver. Debiting before
//! claiming means a failed debit touches no inventory; anything that goes
//! wrong between the debit and the completed sale — a short claim, a claim
//! error, a failed sale — is compensated by releasing whatever was claimed
//! and refunding the amount that was actually debited. Once units are
//! marked sold the money side is final: a delivery failure is logged and
//! the buyer can be re-served the credentials, it never unwinds the sale.

use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{error, instrument, warn};

use saldo_core::{AccountId, Money, UnitId};

use crate::db::{LedgerStore, StoreError};
use crate::error::AppError;
use crate::models::InventoryUnit;
use crate::telegram::ChatTransport;

use super::allocator::InventoryAllocator;
use super::settlement::{Debit, Settlement};

/// User-facing outcome of a purchase attempt. Only infrastructure failures
/// are errors; running out of money or stock is a normal outcome.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    /// Units were sold and presented to the buyer.
    Delivered {
        /// The units now owned by the buyer.
        units: Vec<InventoryUnit>,
        /// Total amount debited.
        total: Money,
    },
    /// Balance did not cover the quote; nothing changed.
    InsufficientBalance {
        /// Balance at the time of the attempt.
        balance: Money,
        /// The quoted total.
        required: Money,
    },
    /// Stock could not cover the quantity; debit was refunded in full.
    InsufficientStock {
        /// Units actually available at the time of the claim.
        available: u32,
    },
}

/// Runs the quote → debit → claim → deliver flow with compensation.
#[derive(Clone)]
pub struct PurchaseOrchestrator {
    store: Arc<dyn LedgerStore>,
    settlement: Settlement,
    allocator: InventoryAllocator,
    transport: Arc<dyn ChatTransport>,
}

impl PurchaseOrchestrator {
    pub fn new(store: Arc<dyn LedgerStore>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            settlement: Settlement::new(Arc::clone(&store)),
            allocator: InventoryAllocator::new(Arc::clone(&store)),
            store,
            transport,
        }
    }

    /// Attempt to purchase `quantity` units for `account`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures (store or quote
    /// arithmetic). Any error surfacing after the debit has had the debit
    /// unwound first: claimed units released, the debited amount credited
    /// back.
    #[instrument(skip(self), fields(%account, quantity))]
    pub async fn purchase(
        &self,
        account: AccountId,
        quantity: u32,
    ) -> Result<PurchaseOutcome, AppError> {
        if quantity == 0 {
            return Err(AppError::BadRequest("quantity must be at least 1".to_owned()));
        }

        // Quote at the current price; the price read here is the one the
        // buyer pays even if an admin changes it mid-flow.
        let price = self.store.unit_price().await?;
        let total = price.times(quantity)?;

        match self.settlement.debit(account, total).await? {
            Debit::Applied => {}
            Debit::InsufficientBalance { balance } => {
                return Ok(PurchaseOutcome::InsufficientBalance {
                    balance,
                    required: total,
                });
            }
        }

        // From here to mark_units_sold the debit is provisional: every
        // failure path must run the unwind before surfacing.
        let claim = match self.allocator.claim(quantity).await {
            Ok(claim) => claim,
            Err(claim_error) => {
                if let Err(unwind_error) = self.unwind(account, total, &[]).await {
                    error!(%account, %total, %unwind_error, "debit left dangling after failed claim");
                }
                return Err(claim_error.into());
            }
        };

        if !claim.is_complete() {
            #[allow(clippy::cast_possible_truncation)] // claim holds at most `quantity` units
            let available = claim.units.len() as u32;
            self.unwind(account, total, &claim.unit_ids()).await?;
            return Ok(PurchaseOutcome::InsufficientStock { available });
        }

        if let Err(sale_error) = self
            .store
            .mark_units_sold(&claim.unit_ids(), account)
            .await
        {
            if let Err(unwind_error) = self.unwind(account, total, &claim.unit_ids()).await {
                error!(%account, %total, %unwind_error, "debit left dangling after failed sale");
            }
            return Err(sale_error.into());
        }

        // The sale is final now; the cart reset and the presentation are
        // both best effort.
        if let Err(cart_error) = self.store.set_cart_quantity(account, 1).await {
            warn!(%account, %cart_error, "cart quantity not reset after sale");
        }
        if let Err(send_error) = self
            .transport
            .send_message(account, &render_delivery(&claim.units, total))
            .await
        {
            warn!(%account, %send_error, "sold units delivered in store but not presented");
        }

        Ok(PurchaseOutcome::Delivered {
            units: claim.units,
            total,
        })
    }

    /// Undo a debited-but-unfulfilled purchase: return any claimed units
    /// to the shelf and credit the full debit back. Both steps are
    /// attempted even when one fails, so a broken release never blocks the
    /// refund; the first failure is reported.
    async fn unwind(
        &self,
        account: AccountId,
        total: Money,
        claimed: &[UnitId],
    ) -> Result<(), StoreError> {
        let released = self.allocator.release(claimed).await;
        if let Err(release_error) = &released {
            warn!(%account, %release_error, "claimed units not released while unwinding");
        }
        let credited = self.settlement.credit(account, total).await;
        if let Err(credit_error) = &credited {
            warn!(%account, %total, %credit_error, "debit not refunded while unwinding");
        }
        released.and(credited)
    }
}

fn render_delivery(units: &[InventoryUnit], total: Money) -> String {
    let mut text = format!("Compra confirmada: {} por {total}\n\n", units.len());
    for unit in units {
        let _ = writeln!(
            text,
            "{}:{}",
            unit.credential.login, unit.credential.password
        );
    }
    text
}
