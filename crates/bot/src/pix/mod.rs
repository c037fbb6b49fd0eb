//! PIX payment provider boundary.
//!
//! The provider issues a charge (QR payload + copy-paste code) and later
//! pushes webhook notifications when its status changes. Notifications are
//! an untrusted hint: the reconciliation service always re-queries the
//! authoritative status through [`PixProvider::get_status`] before
//! mutating anything.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use saldo_core::{AccountId, Money};

pub mod client;
pub mod mock;

pub use client::MercadoPagoClient;
pub use mock::MockProvider;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network-level failure.
    #[error("provider http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the credentials.
    #[error("provider unauthorized")]
    Unauthorized,

    /// Rate limited, retry after the given number of seconds.
    #[error("provider rate limited, retry after {0}s")]
    RateLimited(u64),

    /// Provider returned an error response.
    #[error("provider api error {status}: {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Response body or summary.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("provider parse error: {0}")]
    Parse(String),
}

/// A freshly created PIX charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixCharge {
    /// Provider-assigned reference, canonical text form.
    pub reference: String,
    /// Copy-paste PIX code.
    pub qr_code: String,
    /// Base64-encoded PNG of the scannable QR.
    pub qr_code_base64: String,
}

/// Authoritative charge status as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeStatus {
    /// Settled; the payer's money has arrived.
    Approved,
    /// Not yet settled; a later notification may still confirm it.
    Pending,
    /// Rejected by the payer's bank.
    Rejected,
    /// Cancelled at the provider.
    Cancelled,
    /// Any other provider status.
    Other(String),
}

impl ChargeStatus {
    /// Map a provider status string onto the enum.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "approved" => Self::Approved,
            "pending" | "in_process" => Self::Pending,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Whether the charge has reached the approved/settled terminal state.
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Payment provider operations the core depends on.
#[async_trait]
pub trait PixProvider: Send + Sync {
    /// Create a PIX charge for `amount`, attributed to `account`.
    async fn create_charge(
        &self,
        amount: Money,
        account: AccountId,
    ) -> Result<PixCharge, ProviderError>;

    /// Query the authoritative status of a charge.
    async fn get_status(&self, reference: &str) -> Result<ChargeStatus, ProviderError>;
}

/// Webhook notification pushed by the provider.
///
/// Only a hint: carries the event type and the charge reference. The
/// reference arrives as either a JSON number or a string depending on the
/// provider's mood; [`ProviderNotification::normalized_reference`] folds
/// both into the canonical text form intents are stored under.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderNotification {
    /// Event type; anything but `payment` is ignored.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: NotificationData,
}

/// Payload of a provider notification.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    /// Charge reference, number or string.
    pub id: serde_json::Value,
}

impl ProviderNotification {
    /// Whether this notification concerns a payment at all.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        self.event_type == "payment"
    }

    /// The charge reference in canonical text form, if present.
    #[must_use]
    pub fn normalized_reference(&self) -> Option<String> {
        match &self.data.id {
            serde_json::Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            }
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_status_mapping() {
        assert!(ChargeStatus::from_provider("approved").is_approved());
        assert_eq!(
            ChargeStatus::from_provider("in_process"),
            ChargeStatus::Pending
        );
        assert_eq!(
            ChargeStatus::from_provider("charged_back"),
            ChargeStatus::Other("charged_back".to_owned())
        );
    }

    #[test]
    fn test_notification_reference_number_or_string() {
        let numeric: ProviderNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":123}}"#).unwrap();
        let textual: ProviderNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":" 123 "}}"#).unwrap();
        assert_eq!(numeric.normalized_reference().unwrap(), "123");
        assert_eq!(textual.normalized_reference().unwrap(), "123");
    }

    #[test]
    fn test_notification_non_payment() {
        let other: ProviderNotification =
            serde_json::from_str(r#"{"type":"plan","data":{"id":1}}"#).unwrap();
        assert!(!other.is_payment());
    }

    #[test]
    fn test_notification_reference_missing() {
        let bad: ProviderNotification =
            serde_json::from_str(r#"{"type":"payment","data":{"id":null}}"#).unwrap();
        assert!(bad.normalized_reference().is_none());
    }
}
