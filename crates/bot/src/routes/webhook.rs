//! Provider webhook endpoint.
//!
//! `POST /webhooks/pix` receives Mercado Pago notifications. The response
//! status is the only contract with the provider: 200 means "handled, stop
//! redelivering", 502 means "redeliver later". Every terminal reconcile
//! outcome (credited, duplicate, unknown, not approved, superseded) is a
//! 200; only a failed authoritative status query earns a 502.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::pix::ProviderNotification;
use crate::state::AppState;

/// Handle a PIX payment notification.
#[instrument(skip(state, notification), fields(event_type = %notification.event_type))]
pub async fn pix_webhook(
    State(state): State<AppState>,
    Json(notification): Json<ProviderNotification>,
) -> Result<StatusCode, AppError> {
    if !notification.is_payment() {
        return Ok(StatusCode::OK);
    }

    let Some(reference) = notification.normalized_reference() else {
        info!("payment notification without a usable reference");
        return Ok(StatusCode::OK);
    };

    let outcome = state.reconcile().handle_notification(&reference).await?;
    info!(reference, ?outcome, "notification processed");
    Ok(StatusCode::OK)
}
