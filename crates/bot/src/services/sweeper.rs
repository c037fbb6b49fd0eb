//! Payment intent expiry.
//!
//! The sole timeout authority: a background task that periodically expires
//! pending intents older than the TTL via the same CAS guard the confirmer
//! uses, so a late confirmation and an expiry can never both win.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::db::LedgerStore;
use crate::models::PaymentIntent;
use crate::telegram::ChatTransport;

/// Expires stale payment intents on a fixed interval.
#[derive(Clone)]
pub struct ExpirySweeper {
    store: Arc<dyn LedgerStore>,
    transport: Arc<dyn ChatTransport>,
    ttl: Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        transport: Arc<dyn ChatTransport>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            ttl,
        }
    }

    /// Spawn the background sweep loop, ticking every `interval`.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.sweep_once().await {
                    error!(error = %err, "expiry sweep failed");
                }
            }
        })
    }

    /// Run one sweep pass. Returns the number of intents expired.
    ///
    /// # Errors
    ///
    /// Returns a store error if the stale-intent query fails. Per-intent
    /// CAS failures are not errors (the intent was confirmed first).
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<u64, crate::db::StoreError> {
        let cutoff = chrono::Utc::now()
            - chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::seconds(600));
        let stale = self.store.stale_intents(cutoff).await?;

        let mut expired = 0;
        for intent in stale {
            if self.store.expire_intent(intent.id).await? {
                expired += 1;
                info!(intent = %intent.id, account = %intent.account_id, "payment intent expired");
                self.retract(&intent).await;
            }
            // Lost CAS: a confirmation landed between the query and the
            // expire attempt. The money is the confirmer's business.
        }
        Ok(expired)
    }

    /// Retract the QR and tell the user. One attempt per intent ever; the
    /// expire CAS has already flipped, so a later sweep will not retry.
    async fn retract(&self, intent: &PaymentIntent) {
        if let Some(handle) = &intent.qr_message {
            if let Err(error) = self.transport.delete_message(handle).await {
                warn!(intent = %intent.id, %error, "expired QR message not retracted");
            }
        }
        let notice = format!(
            "O PIX de {} expirou sem pagamento. Gere um novo para recarregar.",
            intent.amount
        );
        if let Err(error) = self
            .transport
            .send_message(intent.account_id, &notice)
            .await
        {
            warn!(intent = %intent.id, %error, "expiry notice not delivered");
        }
    }
}
