//! Chat transport boundary.
//!
//! The core only needs four capabilities from the chat side: send a
//! message, send a photo, edit, delete — each returning or consuming an
//! opaque [`MessageHandle`]. Rendering, keyboards and command routing live
//! entirely outside this crate.
//!
//! [`client::TelegramClient`] implements the trait over the Telegram Bot
//! API with bounded retry; [`mock::MockTransport`] records calls for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use saldo_core::AccountId;

pub mod client;
pub mod mock;

pub use client::TelegramClient;
pub use mock::{MockTransport, SentItem};

/// Opaque handle to a delivered message, sufficient to edit or delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHandle {
    /// Recipient account (chat id).
    pub chat: AccountId,
    /// Transport-assigned message id within that chat.
    pub message_id: i64,
}

/// Errors from the chat transport.
///
/// The split between permanent and transient errors drives the retry
/// policy: permanent recipient errors (blocked bot, malformed request) are
/// never retried; transient ones are, with backoff.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level failure.
    #[error("transport http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The recipient has blocked the bot (or the chat is gone). Permanent.
    #[error("recipient unavailable: {0}")]
    Blocked(String),

    /// Rate limited; retry after the given number of seconds.
    #[error("rate limited, retry after {retry_after}s")]
    RateLimited {
        /// Provider-specified delay in seconds.
        retry_after: u64,
    },

    /// API rejected the request.
    #[error("transport api error {code}: {description}")]
    Api {
        /// Transport error code.
        code: i64,
        /// Human-readable description.
        description: String,
    },

    /// Response body did not match the expected shape.
    #[error("transport parse error: {0}")]
    Parse(String),
}

impl TransportError {
    /// Whether retrying this send can ever succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            // 4xx responses other than rate limiting are caller errors or
            // recipient-side rejections; repeating them changes nothing.
            Self::Blocked(_) => true,
            Self::Api { code, .. } => 400 <= *code && *code < 500,
            Self::Http(_) | Self::RateLimited { .. } | Self::Parse(_) => false,
        }
    }
}

/// Outbound chat operations the core depends on.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver a text message.
    async fn send_message(
        &self,
        chat: AccountId,
        text: &str,
    ) -> Result<MessageHandle, TransportError>;

    /// Deliver a photo with a caption (QR codes).
    async fn send_photo(
        &self,
        chat: AccountId,
        png: Vec<u8>,
        caption: &str,
    ) -> Result<MessageHandle, TransportError>;

    /// Replace the text of a previously sent message.
    async fn edit_message(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<(), TransportError>;

    /// Retract a previously sent message.
    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_classification() {
        assert!(TransportError::Blocked("forbidden".to_owned()).is_permanent());
        assert!(
            TransportError::Api {
                code: 400,
                description: "chat not found".to_owned(),
            }
            .is_permanent()
        );
        assert!(
            !TransportError::Api {
                code: 500,
                description: "internal".to_owned(),
            }
            .is_permanent()
        );
        assert!(!TransportError::RateLimited { retry_after: 3 }.is_permanent());
    }
}
