//! Ledger store: the atomicity primitive everything else composes.
//!
//! Balances, inventory unit states and payment intent guards are the only
//! contended resources in the system. Every mutation of them is expressed
//! as a single atomic conditional update — never a read-modify-write across
//! two calls — so the store is the sole concurrency-safety mechanism.
//!
//! Two implementations:
//!
//! - [`postgres::PgLedgerStore`] — production, conditional `UPDATE`s and
//!   `FOR UPDATE SKIP LOCKED` claims
//! - [`memory::MemoryLedgerStore`] — a mutex-serialised in-memory ledger
//!   with identical semantics, used by tests and local development

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use saldo_core::{AccountId, AccountStage, CredentialPair, IntentId, Money, UnitId};

use crate::models::{Account, InventoryUnit, NewPaymentIntent, PaymentIntent};
use crate::telegram::MessageHandle;

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Errors from ledger store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g. duplicate provider reference).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Atomic conditional mutations over accounts, inventory and payment intents.
///
/// Contract: every method is linearizable per account / per unit / per
/// intent. Two concurrent claims never hand out the same unit; two
/// concurrent debits never both succeed when only one has balance; the
/// confirm and expire guards on one intent are mutually exclusive.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ----- accounts -----

    /// Fetch an account, creating it with a zero balance on first contact.
    async fn get_or_create_account(&self, id: AccountId) -> Result<Account, StoreError>;

    /// All known account ids (for best-effort broadcasts).
    async fn account_ids(&self) -> Result<Vec<AccountId>, StoreError>;

    /// Unconditionally add `amount` to the account's balance, creating the
    /// account if needed. Credits cannot make a balance negative, so this
    /// never fails conditionally.
    async fn credit(&self, id: AccountId, amount: Money) -> Result<(), StoreError>;

    /// Subtract `amount` from the balance only if the current balance
    /// covers it. Returns `false`, with no side effect, when it does not.
    async fn try_debit(&self, id: AccountId, amount: Money) -> Result<bool, StoreError>;

    /// Set the transient cart quantity used by an active purchase flow.
    /// Quantities beyond the storage range (`i32::MAX`) are rejected with
    /// [`StoreError::Conflict`], never clamped.
    async fn set_cart_quantity(&self, id: AccountId, quantity: u32) -> Result<(), StoreError>;

    /// Set the account's conversation stage.
    async fn set_stage(&self, id: AccountId, stage: AccountStage) -> Result<(), StoreError>;

    // ----- inventory -----

    /// Atomically move up to `quantity` available units to `claimed` and
    /// return them. Returns fewer than `quantity` when stock is short;
    /// never returns a unit another claim also received.
    async fn claim_units(&self, quantity: u32) -> Result<Vec<InventoryUnit>, StoreError>;

    /// Finalise claimed units as sold to `buyer`.
    async fn mark_units_sold(&self, ids: &[UnitId], buyer: AccountId) -> Result<(), StoreError>;

    /// Return claimed units to `available` (compensation for a failed
    /// purchase). Only claimed units are touched.
    async fn release_units(&self, ids: &[UnitId]) -> Result<(), StoreError>;

    /// Count of available units.
    async fn available_units(&self) -> Result<u64, StoreError>;

    /// Bulk-insert new available units. Returns the number inserted.
    async fn add_units(&self, credentials: &[CredentialPair]) -> Result<u64, StoreError>;

    /// Delete already-sold units (administrative cleanup). Returns the
    /// number removed.
    async fn delete_sold_units(&self) -> Result<u64, StoreError>;

    // ----- pricing -----

    /// Current unit price.
    async fn unit_price(&self) -> Result<Money, StoreError>;

    /// Replace the unit price (last write wins).
    async fn set_unit_price(&self, price: Money) -> Result<(), StoreError>;

    // ----- payment intents -----

    /// Persist a freshly created intent.
    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, StoreError>;

    /// Look up an intent by provider reference. `reference` is expected in
    /// canonical text form (see [`crate::services::reconcile`]).
    async fn find_intent_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentIntent>, StoreError>;

    /// Record the retractable QR message for an intent.
    async fn set_intent_artifact(
        &self,
        id: IntentId,
        message: &MessageHandle,
    ) -> Result<(), StoreError>;

    /// Confirm CAS: mark the intent confirmed only if it is neither
    /// confirmed nor cancelled. Returns whether this caller won.
    async fn confirm_intent(&self, id: IntentId) -> Result<bool, StoreError>;

    /// Expire CAS: mark the intent cancelled/expired only if it is neither
    /// confirmed nor cancelled. Returns whether this caller won.
    async fn expire_intent(&self, id: IntentId) -> Result<bool, StoreError>;

    /// Pending intents created before `cutoff` (sweeper input).
    async fn stale_intents(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentIntent>, StoreError>;
}
