//! Inventory allocation.

use std::sync::Arc;

use tracing::instrument;

use saldo_core::UnitId;

use crate::db::{LedgerStore, StoreError};
use crate::models::InventoryUnit;

/// Result of a claim attempt.
#[derive(Debug, Clone)]
pub struct Claim {
    /// Units moved to `claimed`, exclusively held by this caller.
    pub units: Vec<InventoryUnit>,
    /// How many requested units could not be claimed.
    pub shortfall: u32,
}

impl Claim {
    /// Whether the full requested quantity was claimed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.shortfall == 0
    }

    /// Ids of the claimed units.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.iter().map(|unit| unit.id).collect()
    }
}

/// Hands out inventory units with exclusive ownership.
///
/// A claim either holds a unit exclusively or does not hold it at all;
/// partial claims are reported, never silently topped up later.
#[derive(Clone)]
pub struct InventoryAllocator {
    store: Arc<dyn LedgerStore>,
}

impl InventoryAllocator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Claim up to `quantity` available units.
    ///
    /// # Errors
    ///
    /// Returns a store error if the claim query fails; no units change
    /// state in that case.
    #[instrument(skip(self))]
    pub async fn claim(&self, quantity: u32) -> Result<Claim, StoreError> {
        let units = self.store.claim_units(quantity).await?;
        #[allow(clippy::cast_possible_truncation)] // never more than `quantity` rows
        let claimed = units.len() as u32;
        Ok(Claim {
            units,
            shortfall: quantity - claimed,
        })
    }

    /// Return claimed units to the available pool.
    ///
    /// # Errors
    ///
    /// Returns a store error if the release query fails.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn release(&self, ids: &[UnitId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.release_units(ids).await
    }
}
