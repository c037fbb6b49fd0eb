//! Telegram Bot API transport client.
//!
//! All sends go through a bounded retry loop: up to [`MAX_ATTEMPTS`]
//! attempts, starting at [`INITIAL_BACKOFF`] and doubling per attempt.
//! A 429 response waits out the server-provided `retry_after` instead of
//! the computed backoff; permanent recipient errors fail immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use saldo_core::AccountId;

use super::{ChatTransport, MessageHandle, TransportError};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(800);

/// Telegram Bot API client.
#[derive(Clone)]
pub struct TelegramClient {
    inner: Arc<TelegramClientInner>,
}

struct TelegramClientInner {
    client: reqwest::Client,
    /// `{api_url}/bot{token}` — contains the token, never logged.
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Used for methods whose result payload we do not care about
/// (`editMessageText`, `deleteMessage`).
#[derive(Debug, Deserialize)]
struct Ignored(#[allow(dead_code)] serde_json::Value);

impl TelegramClient {
    /// Create a client for the given bot token.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client fails to build.
    pub fn new(token: &SecretString) -> Result<Self, TransportError> {
        Self::with_api_url(TELEGRAM_API_URL, token)
    }

    /// Create a client against a custom API base URL (tests, proxies).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client fails to build.
    pub fn with_api_url(api_url: &str, token: &SecretString) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(TelegramClientInner {
                client,
                base_url: format!(
                    "{}/bot{}",
                    api_url.trim_end_matches('/'),
                    token.expose_secret()
                ),
            }),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.inner.base_url)
    }

    /// One attempt of a JSON-body API call.
    async fn call_once<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .inner
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let body: ApiResponse<T> = response.json().await?;
        if body.ok {
            return body
                .result
                .ok_or_else(|| TransportError::Parse("ok response without result".to_owned()));
        }

        let code = body.error_code.unwrap_or(0);
        let description = body.description.unwrap_or_else(|| "unknown".to_owned());
        Err(match code {
            403 => TransportError::Blocked(description),
            429 => TransportError::RateLimited {
                retry_after: body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .unwrap_or(INITIAL_BACKOFF.as_secs().max(1)),
            },
            _ => TransportError::Api { code, description },
        })
    }

    /// Retry loop over a JSON-body API call.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, TransportError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.call_once(method, &payload).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_permanent() || attempt >= MAX_ATTEMPTS => return Err(err),
                Err(err) => {
                    let delay = match &err {
                        TransportError::RateLimited { retry_after } => {
                            Duration::from_secs(*retry_after).max(backoff)
                        }
                        _ => backoff,
                    };
                    warn!(method, attempt, ?delay, error = %err, "transport call failed, retrying");
                    tokio::time::sleep(delay).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat: AccountId,
        text: &str,
    ) -> Result<MessageHandle, TransportError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                json!({ "chat_id": chat.as_i64(), "text": text }),
            )
            .await?;
        debug!(%chat, message_id = sent.message_id, "message sent");
        Ok(MessageHandle {
            chat,
            message_id: sent.message_id,
        })
    }

    async fn send_photo(
        &self,
        chat: AccountId,
        png: Vec<u8>,
        caption: &str,
    ) -> Result<MessageHandle, TransportError> {
        // Multipart bodies cannot be reused, so the form is rebuilt per attempt.
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            let form = multipart::Form::new()
                .text("chat_id", chat.as_i64().to_string())
                .text("caption", caption.to_owned())
                .part(
                    "photo",
                    multipart::Part::bytes(png.clone())
                        .file_name("qr.png")
                        .mime_str("image/png")
                        .map_err(TransportError::Http)?,
                );

            let result: Result<SentMessage, TransportError> = async {
                let response = self
                    .inner
                    .client
                    .post(self.method_url("sendPhoto"))
                    .multipart(form)
                    .send()
                    .await?;
                Self::decode(response).await
            }
            .await;

            match result {
                Ok(sent) => {
                    return Ok(MessageHandle {
                        chat,
                        message_id: sent.message_id,
                    });
                }
                Err(err) if err.is_permanent() || attempt >= MAX_ATTEMPTS => return Err(err),
                Err(err) => {
                    let delay = match &err {
                        TransportError::RateLimited { retry_after } => {
                            Duration::from_secs(*retry_after).max(backoff)
                        }
                        _ => backoff,
                    };
                    warn!(attempt, ?delay, error = %err, "sendPhoto failed, retrying");
                    tokio::time::sleep(delay).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<(), TransportError> {
        let _: Ignored = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": handle.chat.as_i64(),
                    "message_id": handle.message_id,
                    "text": text,
                }),
            )
            .await?;
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), TransportError> {
        let _: Ignored = self
            .call(
                "deleteMessage",
                json!({
                    "chat_id": handle.chat.as_i64(),
                    "message_id": handle.message_id,
                }),
            )
            .await?;
        Ok(())
    }
}
