//! HTTP routes.

use axum::Router;
use axum::routing::post;

use crate::state::AppState;

pub mod webhook;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/pix", post(webhook::pix_webhook))
}
