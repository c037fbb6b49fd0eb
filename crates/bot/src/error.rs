//! Unified error handling.
//!
//! Each layer has its own `thiserror` enum (`StoreError`, `ProviderError`,
//! `TransportError`); `AppError` unifies them at the service and route
//! boundary. Route handlers return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use saldo_core::{Money, MoneyError};

use crate::db::StoreError;
use crate::pix::ProviderError;
use crate::telegram::TransportError;

/// Application-level error type for the bot service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Ledger store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Payment provider call failed. Maps to 502 so the provider's webhook
    /// delivery retries instead of dropping the notification.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Chat transport call failed after retries were exhausted.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Monetary amount failed to parse or combine.
    #[error("amount error: {0}")]
    Amount(#[from] MoneyError),

    /// Recharge amount below the accepted minimum.
    #[error("amount below minimum of {minimum}")]
    AmountBelowMinimum {
        /// The smallest accepted recharge.
        minimum: Money,
    },

    /// Bad request from the caller.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Store(_) | Self::Provider(_) | Self::Transport(_)) {
            tracing::error!(error = %self, "request error");
        }

        let status = match &self {
            Self::Store(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider(_) => StatusCode::BAD_GATEWAY,
            Self::Amount(_) | Self::AmountBelowMinimum { .. } | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Transport(_) => "Internal server error".to_owned(),
            Self::Provider(_) => "Payment provider unavailable".to_owned(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_map_to_bad_gateway() {
        let err = AppError::Provider(ProviderError::Unauthorized);
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_store_errors_map_to_internal() {
        let err = AppError::Store(StoreError::NotFound);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_amount_errors_map_to_bad_request() {
        let err = AppError::AmountBelowMinimum {
            minimum: Money::from_cents(300),
        };
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
