//! In-memory ledger store.
//!
//! One `tokio::sync::Mutex` serialises every operation, which gives the
//! exact atomicity contract of the Postgres store (each trait method is one
//! indivisible step) without a database. Used by the integration tests and
//! handy for local development.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use saldo_core::{
    AccountId, AccountStage, CredentialPair, IntentId, IntentStatus, Money, UnitId, UnitStatus,
};

use crate::models::{Account, InventoryUnit, NewPaymentIntent, PaymentIntent};
use crate::telegram::MessageHandle;

use super::{LedgerStore, StoreError};

#[derive(Default)]
struct Ledger {
    accounts: BTreeMap<AccountId, Account>,
    units: BTreeMap<UnitId, InventoryUnit>,
    intents: BTreeMap<IntentId, PaymentIntent>,
    unit_price: Option<Money>,
    next_unit_id: i64,
    claims_unavailable: bool,
}

impl Ledger {
    fn account_entry(&mut self, id: AccountId) -> &mut Account {
        self.accounts.entry(id).or_insert_with(|| Account {
            id,
            balance: Money::ZERO,
            cart_quantity: 1,
            stage: AccountStage::Idle,
            created_at: Utc::now(),
        })
    }
}

/// Mutex-serialised in-memory [`LedgerStore`].
pub struct MemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl MemoryLedgerStore {
    /// Create an empty store with the given unit price.
    #[must_use]
    pub fn new(unit_price: Money) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                unit_price: Some(unit_price),
                next_unit_id: 1,
                ..Ledger::default()
            }),
        }
    }

    /// Seed an account with a starting balance.
    pub async fn seed_account(&self, id: AccountId, balance: Money) {
        let mut ledger = self.ledger.lock().await;
        ledger.account_entry(id).balance = balance;
    }

    /// Current balance of an account (zero if unknown).
    pub async fn balance(&self, id: AccountId) -> Money {
        let ledger = self.ledger.lock().await;
        ledger
            .accounts
            .get(&id)
            .map_or(Money::ZERO, |account| account.balance)
    }

    /// Snapshot of a unit's status.
    pub async fn unit_status(&self, id: UnitId) -> Option<UnitStatus> {
        let ledger = self.ledger.lock().await;
        ledger.units.get(&id).map(|unit| unit.status)
    }

    /// Snapshot of an intent.
    pub async fn intent(&self, id: IntentId) -> Option<PaymentIntent> {
        let ledger = self.ledger.lock().await;
        ledger.intents.get(&id).cloned()
    }

    /// Backdate an intent's creation time (sweeper tests).
    pub async fn backdate_intent(&self, id: IntentId, created_at: DateTime<Utc>) {
        let mut ledger = self.ledger.lock().await;
        if let Some(intent) = ledger.intents.get_mut(&id) {
            intent.created_at = created_at;
        }
    }

    /// Make claim attempts fail as if the unit table were unreachable
    /// (failure injection for compensation paths).
    pub async fn fail_claims(&self, fail: bool) {
        let mut ledger = self.ledger.lock().await;
        ledger.claims_unavailable = fail;
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new(Money::from_cents(70))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_or_create_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let mut ledger = self.ledger.lock().await;
        Ok(ledger.account_entry(id).clone())
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger.accounts.keys().copied().collect())
    }

    async fn credit(&self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        let account = ledger.account_entry(id);
        account.balance = account
            .balance
            .checked_add(amount)
            .map_err(|e| StoreError::DataCorruption(e.to_string()))?;
        Ok(())
    }

    async fn try_debit(&self, id: AccountId, amount: Money) -> Result<bool, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let account = ledger.account_entry(id);
        match account.balance.checked_sub(amount) {
            Ok(remaining) => {
                account.balance = remaining;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    async fn set_cart_quantity(&self, id: AccountId, quantity: u32) -> Result<(), StoreError> {
        if i32::try_from(quantity).is_err() {
            return Err(StoreError::Conflict(format!(
                "cart quantity {quantity} out of range"
            )));
        }
        let mut ledger = self.ledger.lock().await;
        let account = ledger.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.cart_quantity = quantity;
        Ok(())
    }

    async fn set_stage(&self, id: AccountId, stage: AccountStage) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        let account = ledger.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.stage = stage;
        Ok(())
    }

    async fn claim_units(&self, quantity: u32) -> Result<Vec<InventoryUnit>, StoreError> {
        let mut ledger = self.ledger.lock().await;
        if ledger.claims_unavailable {
            return Err(StoreError::DataCorruption(
                "inventory unavailable".to_owned(),
            ));
        }
        let quantity = quantity as usize;
        let claimable: Vec<UnitId> = ledger
            .units
            .values()
            .filter(|unit| unit.status == UnitStatus::Available)
            .take(quantity)
            .map(|unit| unit.id)
            .collect();

        let mut claimed = Vec::with_capacity(claimable.len());
        for id in claimable {
            if let Some(unit) = ledger.units.get_mut(&id) {
                unit.status = UnitStatus::Claimed;
                claimed.push(unit.clone());
            }
        }
        Ok(claimed)
    }

    async fn mark_units_sold(&self, ids: &[UnitId], buyer: AccountId) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        for id in ids {
            if let Some(unit) = ledger.units.get_mut(id)
                && unit.status == UnitStatus::Claimed
            {
                unit.status = UnitStatus::Sold;
                unit.sold_to = Some(buyer);
            }
        }
        Ok(())
    }

    async fn release_units(&self, ids: &[UnitId]) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        for id in ids {
            if let Some(unit) = ledger.units.get_mut(id)
                && unit.status == UnitStatus::Claimed
            {
                unit.status = UnitStatus::Available;
            }
        }
        Ok(())
    }

    async fn available_units(&self) -> Result<u64, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .units
            .values()
            .filter(|unit| unit.status == UnitStatus::Available)
            .count() as u64)
    }

    async fn add_units(&self, credentials: &[CredentialPair]) -> Result<u64, StoreError> {
        let mut ledger = self.ledger.lock().await;
        for credential in credentials {
            let id = UnitId::new(ledger.next_unit_id);
            ledger.next_unit_id += 1;
            ledger.units.insert(
                id,
                InventoryUnit {
                    id,
                    credential: credential.clone(),
                    status: UnitStatus::Available,
                    sold_to: None,
                },
            );
        }
        Ok(credentials.len() as u64)
    }

    async fn delete_sold_units(&self) -> Result<u64, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let before = ledger.units.len();
        ledger.units.retain(|_, unit| unit.status != UnitStatus::Sold);
        Ok((before - ledger.units.len()) as u64)
    }

    async fn unit_price(&self) -> Result<Money, StoreError> {
        let ledger = self.ledger.lock().await;
        ledger.unit_price.ok_or(StoreError::NotFound)
    }

    async fn set_unit_price(&self, price: Money) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        ledger.unit_price = Some(price);
        Ok(())
    }

    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let duplicate = ledger.intents.values().any(|existing| {
            existing.provider_reference.as_deref() == Some(intent.provider_reference.as_str())
        });
        if duplicate {
            return Err(StoreError::Conflict(
                "provider reference already exists".to_owned(),
            ));
        }

        let record = PaymentIntent {
            id: intent.id,
            account_id: intent.account_id,
            amount: intent.amount,
            provider_reference: Some(intent.provider_reference),
            status: IntentStatus::Created,
            confirmed: false,
            cancelled: false,
            qr_message: None,
            created_at: Utc::now(),
        };
        ledger.intents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_intent_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .intents
            .values()
            .find(|intent| intent.provider_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn set_intent_artifact(
        &self,
        id: IntentId,
        message: &MessageHandle,
    ) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().await;
        let intent = ledger.intents.get_mut(&id).ok_or(StoreError::NotFound)?;
        intent.qr_message = Some(message.clone());
        Ok(())
    }

    async fn confirm_intent(&self, id: IntentId) -> Result<bool, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let intent = ledger.intents.get_mut(&id).ok_or(StoreError::NotFound)?;
        if intent.confirmed || intent.cancelled {
            return Ok(false);
        }
        intent.confirmed = true;
        intent.status = IntentStatus::Confirmed;
        Ok(true)
    }

    async fn expire_intent(&self, id: IntentId) -> Result<bool, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let intent = ledger.intents.get_mut(&id).ok_or(StoreError::NotFound)?;
        if intent.confirmed || intent.cancelled {
            return Ok(false);
        }
        intent.cancelled = true;
        intent.status = IntentStatus::Expired;
        Ok(true)
    }

    async fn stale_intents(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentIntent>, StoreError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .intents
            .values()
            .filter(|intent| intent.is_pending() && intent.created_at < cutoff)
            .cloned()
            .collect())
    }
}
