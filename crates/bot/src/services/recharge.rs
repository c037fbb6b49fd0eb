//! Funding intent creation.
//!
//! Order matters: the charge is created at the provider first, then the
//! intent is persisted with the provider's reference, then the QR is shown.
//! A charge-creation failure persists nothing; a persisted intent with no
//! QR message is still reconcilable and still expires on schedule.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{instrument, warn};

use saldo_core::{AccountId, IntentId, Money};

use crate::db::LedgerStore;
use crate::error::AppError;
use crate::models::{NewPaymentIntent, PaymentIntent};
use crate::pix::PixProvider;
use crate::telegram::ChatTransport;

/// Smallest recharge the provider will charge for.
pub fn minimum_amount() -> Money {
    Money::from_cents(300)
}

/// Creates PIX charges and the payment intents that track them.
#[derive(Clone)]
pub struct RechargeService {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn PixProvider>,
    transport: Arc<dyn ChatTransport>,
}

impl RechargeService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PixProvider>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            store,
            provider,
            transport,
        }
    }

    /// Create a charge for `amount` and show its QR to the account.
    ///
    /// # Errors
    ///
    /// Returns `AmountBelowMinimum` for amounts under R$3.00, a provider
    /// error if the charge cannot be created (nothing persisted), or a
    /// store error if the intent cannot be recorded.
    #[instrument(skip(self), fields(%account, %amount))]
    pub async fn start(
        &self,
        account: AccountId,
        amount: Money,
    ) -> Result<PaymentIntent, AppError> {
        if amount < minimum_amount() {
            return Err(AppError::AmountBelowMinimum {
                minimum: minimum_amount(),
            });
        }

        let charge = self.provider.create_charge(amount, account).await?;
        let intent = self
            .store
            .insert_intent(NewPaymentIntent {
                id: IntentId::generate(),
                account_id: account,
                amount,
                provider_reference: charge.reference,
            })
            .await?;

        // QR presentation is best effort: the intent is live either way,
        // and reconciliation does not depend on the message existing.
        let png = match BASE64.decode(&charge.qr_code_base64) {
            Ok(png) => png,
            Err(error) => {
                warn!(intent = %intent.id, %error, "provider sent undecodable QR image");
                return Ok(intent);
            }
        };
        let caption = format!(
            "Pague {amount} via PIX para creditar seu saldo.\n\nCopia e cola:\n{}",
            charge.qr_code
        );
        match self.transport.send_photo(account, png, &caption).await {
            Ok(handle) => {
                self.store.set_intent_artifact(intent.id, &handle).await?;
                Ok(PaymentIntent {
                    qr_message: Some(handle),
                    ..intent
                })
            }
            Err(error) => {
                warn!(intent = %intent.id, %error, "QR message not delivered");
                Ok(intent)
            }
        }
    }
}
