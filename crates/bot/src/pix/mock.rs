//! Scriptable payment provider for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use saldo_core::{AccountId, Money};

use super::{ChargeStatus, PixCharge, PixProvider, ProviderError};

/// In-memory [`PixProvider`] with programmable statuses.
///
/// Charges get sequential references starting at 1000 and begin `Pending`;
/// tests move them with [`MockProvider::set_status`]. The whole provider
/// can be toggled unreachable to exercise the drop-and-redeliver path.
#[derive(Default)]
pub struct MockProvider {
    statuses: Mutex<HashMap<String, ChargeStatus>>,
    unavailable: Mutex<bool>,
    next_reference: AtomicU64,
    status_queries: AtomicU64,
}

impl MockProvider {
    /// Create an empty mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_reference: AtomicU64::new(1000),
            ..Self::default()
        }
    }

    /// Register a charge reference with a status (for notifications about
    /// charges this process never created, use an unregistered reference).
    pub fn set_status(&self, reference: &str, status: ChargeStatus) {
        self.statuses
            .lock()
            .expect("mock lock poisoned")
            .insert(reference.to_owned(), status);
    }

    /// Make every provider call fail until re-enabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().expect("mock lock poisoned") = unavailable;
    }

    /// Number of authoritative status queries served.
    pub fn status_queries(&self) -> u64 {
        self.status_queries.load(Ordering::Relaxed)
    }

    fn check_available(&self) -> Result<(), ProviderError> {
        if *self.unavailable.lock().expect("mock lock poisoned") {
            return Err(ProviderError::Api {
                status: 503,
                message: "provider unavailable".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PixProvider for MockProvider {
    async fn create_charge(
        &self,
        _amount: Money,
        _account: AccountId,
    ) -> Result<PixCharge, ProviderError> {
        self.check_available()?;
        let reference = self.next_reference.fetch_add(1, Ordering::Relaxed).to_string();
        self.set_status(&reference, ChargeStatus::Pending);
        Ok(PixCharge {
            reference: reference.clone(),
            qr_code: format!("00020126pix-code-{reference}"),
            // A 1x1 PNG would do; tests only forward the bytes.
            qr_code_base64: "aVZCT1J3MEtHZ28=".to_owned(),
        })
    }

    async fn get_status(&self, reference: &str) -> Result<ChargeStatus, ProviderError> {
        self.check_available()?;
        self.status_queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .statuses
            .lock()
            .expect("mock lock poisoned")
            .get(reference)
            .cloned()
            .unwrap_or(ChargeStatus::Other("not_found".to_owned())))
    }
}
