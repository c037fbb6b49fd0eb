//! Payment reconciliation.
//!
//! Webhook notifications are an untrusted, at-least-once hint. The only
//! facts this service acts on are the stored intent and the provider's
//! authoritative status, re-queried on every notification. The confirm CAS
//! on the intent is the idempotency guard: however many duplicates arrive,
//! exactly one caller wins it and credits the balance.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use saldo_core::{AccountId, Money};

use crate::db::LedgerStore;
use crate::error::AppError;
use crate::models::PaymentIntent;
use crate::telegram::ChatTransport;

use super::settlement::Settlement;

/// Terminal outcome of processing one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// This notification won the confirm race and credited the balance.
    Credited {
        /// Account that was credited.
        account: AccountId,
        /// Amount credited (the intent's amount, never the payload's).
        amount: Money,
    },
    /// The intent was already confirmed; nothing changed.
    Duplicate,
    /// No intent carries this reference; acknowledged and ignored.
    Unknown,
    /// The provider does not (yet) report the charge as approved.
    NotApproved,
    /// The intent expired before the confirmation arrived.
    Superseded,
}

/// Processes provider payment notifications.
#[derive(Clone)]
pub struct ReconcileService {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn crate::pix::PixProvider>,
    transport: Arc<dyn ChatTransport>,
    settlement: Settlement,
}

impl ReconcileService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn crate::pix::PixProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            settlement: Settlement::new(Arc::clone(&store)),
            store,
            provider,
            transport,
        }
    }

    /// Reconcile the charge behind `reference` (canonical text form).
    ///
    /// # Errors
    ///
    /// Returns a provider error when the authoritative status cannot be
    /// fetched — the notification is dropped with no state change so the
    /// provider redelivers it — or a store error on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn handle_notification(
        &self,
        reference: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let Some(intent) = self.store.find_intent_by_reference(reference).await? else {
            info!(reference, "notification for unknown charge ignored");
            return Ok(ReconcileOutcome::Unknown);
        };

        // Cheap duplicate short-circuit; the CAS below is the real guard.
        if intent.confirmed {
            return Ok(ReconcileOutcome::Duplicate);
        }
        if intent.cancelled {
            return Ok(ReconcileOutcome::Superseded);
        }

        // Never trust the payload: re-query the authoritative status. A
        // failure here leaves everything untouched.
        let status = self.provider.get_status(reference).await?;
        if !status.is_approved() {
            info!(intent = %intent.id, ?status, "charge not approved yet");
            return Ok(ReconcileOutcome::NotApproved);
        }

        if !self.store.confirm_intent(intent.id).await? {
            // Lost the race to a duplicate or to the expiry sweeper.
            let now = self
                .store
                .find_intent_by_reference(reference)
                .await?
                .ok_or_else(|| AppError::BadRequest("intent vanished".to_owned()))?;
            return Ok(if now.confirmed {
                ReconcileOutcome::Duplicate
            } else {
                ReconcileOutcome::Superseded
            });
        }

        self.settlement
            .credit(intent.account_id, intent.amount)
            .await?;
        info!(intent = %intent.id, account = %intent.account_id, amount = %intent.amount,
            "payment confirmed and credited");

        self.finish_presentation(&intent).await;

        Ok(ReconcileOutcome::Credited {
            account: intent.account_id,
            amount: intent.amount,
        })
    }

    /// Retract the QR and announce the credit. Best effort: the credit is
    /// already final, so failures are logged and left alone.
    async fn finish_presentation(&self, intent: &PaymentIntent) {
        if let Some(handle) = &intent.qr_message {
            if let Err(error) = self.transport.delete_message(handle).await {
                warn!(intent = %intent.id, %error, "stale QR message not retracted");
            }
        }
        let notice = format!("Pagamento de {} confirmado, saldo creditado.", intent.amount);
        if let Err(error) = self
            .transport
            .send_message(intent.account_id, &notice)
            .await
        {
            warn!(intent = %intent.id, %error, "confirmation notice not delivered");
        }
    }
}
