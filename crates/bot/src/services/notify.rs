//! Best-effort broadcasts.

use std::sync::Arc;

use tracing::{debug, instrument};

use saldo_core::Money;

use crate::db::{LedgerStore, StoreError};
use crate::telegram::ChatTransport;

/// Sends announcements to every known account.
///
/// Strictly best effort: a recipient that blocked the bot or a transient
/// send failure is logged and skipped, never retried across the batch.
#[derive(Clone)]
pub struct Broadcaster {
    store: Arc<dyn LedgerStore>,
    transport: Arc<dyn ChatTransport>,
}

impl Broadcaster {
    pub fn new(store: Arc<dyn LedgerStore>, transport: Arc<dyn ChatTransport>) -> Self {
        Self { store, transport }
    }

    /// Announce replenished stock. Returns how many accounts were reached.
    ///
    /// # Errors
    ///
    /// Returns a store error if the account list cannot be read.
    #[instrument(skip(self))]
    pub async fn stock_replenished(&self, available: u64) -> Result<u64, StoreError> {
        let text =
            format!("Estoque reabastecido: {available} unidades disponíveis. Bom proveito!");
        self.broadcast(&text).await
    }

    /// Announce a price change. Returns how many accounts were reached.
    ///
    /// # Errors
    ///
    /// Returns a store error if the account list cannot be read.
    #[instrument(skip(self))]
    pub async fn price_changed(&self, price: Money) -> Result<u64, StoreError> {
        let text = format!("Novo preço por unidade: {price}.");
        self.broadcast(&text).await
    }

    async fn broadcast(&self, text: &str) -> Result<u64, StoreError> {
        let mut delivered = 0;
        for account in self.store.account_ids().await? {
            match self.transport.send_message(account, text).await {
                Ok(_) => delivered += 1,
                Err(error) => {
                    debug!(%account, %error, "broadcast recipient skipped");
                }
            }
        }
        Ok(delivered)
    }
}
