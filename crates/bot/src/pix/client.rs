//! Mercado Pago PIX client.
//!
//! No retry loop here: charge creation failures surface to the caller as a
//! retryable error, and status-query failures make the reconciliation
//! service drop the notification and rely on the provider's redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use saldo_core::{AccountId, Money};

use super::{ChargeStatus, PixCharge, PixProvider, ProviderError};

const DEFAULT_API_URL: &str = "https://api.mercadopago.com";

/// Mercado Pago payments API client.
#[derive(Clone)]
pub struct MercadoPagoClient {
    inner: Arc<MercadoPagoClientInner>,
}

struct MercadoPagoClientInner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: i64,
    status: Option<String>,
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
}

impl MercadoPagoClient {
    /// Create a client for the given access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the token
    /// contains invalid header characters.
    pub fn new(access_token: &SecretString) -> Result<Self, ProviderError> {
        Self::with_api_url(DEFAULT_API_URL, access_token)
    }

    /// Create a client against a custom API base URL (tests, sandboxes).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build or the token
    /// contains invalid header characters.
    pub fn with_api_url(
        api_url: &str,
        access_token: &SecretString,
    ) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = format!("Bearer {}", access_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ProviderError::Parse("invalid access token".to_owned()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(MercadoPagoClientInner {
                client,
                base_url: api_url.trim_end_matches('/').to_owned(),
            }),
        })
    }

    async fn handle_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return ProviderError::RateLimited(retry_after);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProviderError::Unauthorized;
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_owned());
        ProviderError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

impl std::fmt::Debug for MercadoPagoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoPagoClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PixProvider for MercadoPagoClient {
    #[instrument(skip(self), fields(%account))]
    async fn create_charge(
        &self,
        amount: Money,
        account: AccountId,
    ) -> Result<PixCharge, ProviderError> {
        let transaction_amount = amount
            .as_decimal()
            .to_f64()
            .ok_or_else(|| ProviderError::Parse("amount not representable".to_owned()))?;

        let response = self
            .inner
            .client
            .post(format!("{}/v1/payments", self.inner.base_url))
            .header("X-Idempotency-Key", Uuid::new_v4().to_string())
            .json(&json!({
                "transaction_amount": transaction_amount,
                "description": "Balance recharge",
                "payment_method_id": "pix",
                "payer": { "email": format!("{}@telegram.com", account.as_i64()) },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let payment: PaymentResponse = response.json().await?;
        let transaction = payment
            .point_of_interaction
            .and_then(|poi| poi.transaction_data)
            .ok_or_else(|| ProviderError::Parse("charge without QR payload".to_owned()))?;

        Ok(PixCharge {
            reference: payment.id.to_string(),
            qr_code: transaction
                .qr_code
                .ok_or_else(|| ProviderError::Parse("charge without qr_code".to_owned()))?,
            qr_code_base64: transaction.qr_code_base64.ok_or_else(|| {
                ProviderError::Parse("charge without qr_code_base64".to_owned())
            })?,
        })
    }

    #[instrument(skip(self))]
    async fn get_status(&self, reference: &str) -> Result<ChargeStatus, ProviderError> {
        let response = self
            .inner
            .client
            .get(format!("{}/v1/payments/{reference}", self.inner.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error(response).await);
        }

        let payment: PaymentResponse = response.json().await?;
        let status = payment
            .status
            .ok_or_else(|| ProviderError::Parse("payment without status".to_owned()))?;
        Ok(ChargeStatus::from_provider(&status))
    }
}
