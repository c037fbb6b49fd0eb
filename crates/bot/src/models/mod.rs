//! Persisted entity models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use saldo_core::{
    AccountId, AccountStage, CredentialPair, IntentId, IntentStatus, Money, UnitId, UnitStatus,
};

use crate::telegram::MessageHandle;

/// A storefront account.
///
/// Created lazily on first contact, never deleted. The balance is only ever
/// mutated by the settlement engine's atomic credit/debit operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: Money,
    /// Transient quantity selection for an active purchase flow.
    pub cart_quantity: u32,
    /// What the chat layer is currently waiting for from this account.
    pub stage: AccountStage,
    pub created_at: DateTime<Utc>,
}

/// A single sellable credential unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: UnitId,
    pub credential: CredentialPair,
    pub status: UnitStatus,
    /// The buyer, once the unit is sold.
    pub sold_to: Option<AccountId>,
}

/// One requested funding operation, tracked from charge creation through
/// confirmation or expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: IntentId,
    pub account_id: AccountId,
    pub amount: Money,
    /// Provider-assigned charge reference. Stored in canonical text form;
    /// notifications may carry it as text or a number.
    pub provider_reference: Option<String>,
    pub status: IntentStatus,
    /// Idempotency guard: flipped exactly once by the confirm CAS.
    pub confirmed: bool,
    /// Expiry guard: flipped exactly once by the sweeper's expire CAS.
    pub cancelled: bool,
    /// The QR message shown to the user, retractable on confirm/expiry.
    pub qr_message: Option<MessageHandle>,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    /// Whether the intent is still awaiting a terminal transition.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        !self.confirmed && !self.cancelled
    }
}

/// Fields for inserting a new payment intent.
#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub id: IntentId,
    pub account_id: AccountId,
    pub amount: Money,
    pub provider_reference: String,
}
