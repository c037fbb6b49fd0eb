//! Balance settlement.

use std::sync::Arc;

use tracing::instrument;

use saldo_core::{AccountId, Money};

use crate::db::{LedgerStore, StoreError};

/// Outcome of a debit attempt. Insufficient balance is a normal outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Debit {
    /// The full amount was subtracted.
    Applied,
    /// Balance did not cover the amount; nothing changed.
    InsufficientBalance {
        /// The balance at the time of the attempt.
        balance: Money,
    },
}

/// Atomic per-account balance operations.
///
/// A debit applies in full or not at all; a credit always applies. Callers
/// compose these into larger flows and run their own compensation.
#[derive(Clone)]
pub struct Settlement {
    store: Arc<dyn LedgerStore>,
}

impl Settlement {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Attempt to subtract `amount` from the account's balance.
    ///
    /// # Errors
    ///
    /// Returns a store error if the underlying update fails.
    #[instrument(skip(self), fields(%account, %amount))]
    pub async fn debit(&self, account: AccountId, amount: Money) -> Result<Debit, StoreError> {
        if self.store.try_debit(account, amount).await? {
            return Ok(Debit::Applied);
        }
        // Reported balance is informational; it may already have moved.
        let current = self.store.get_or_create_account(account).await?;
        Ok(Debit::InsufficientBalance {
            balance: current.balance,
        })
    }

    /// Add `amount` to the account's balance, creating the account if it
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a store error if the underlying update fails.
    #[instrument(skip(self), fields(%account, %amount))]
    pub async fn credit(&self, account: AccountId, amount: Money) -> Result<(), StoreError> {
        self.store.credit(account, amount).await
    }
}
