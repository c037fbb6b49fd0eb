//! Recording chat transport for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use saldo_core::AccountId;

use super::{ChatTransport, MessageHandle, TransportError};

/// One recorded outbound operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentItem {
    Message {
        chat: AccountId,
        text: String,
    },
    Photo {
        chat: AccountId,
        caption: String,
    },
    Edit {
        handle: MessageHandle,
        text: String,
    },
    Delete {
        handle: MessageHandle,
    },
}

/// In-memory [`ChatTransport`] that records every call.
///
/// Individual chats can be marked as blocked to exercise the
/// permanent-failure path.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentItem>>,
    blocked: Mutex<Vec<AccountId>>,
    next_message_id: AtomicI64,
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a chat as having blocked the bot.
    pub fn block(&self, chat: AccountId) {
        self.blocked.lock().expect("mock lock poisoned").push(chat);
    }

    /// Everything sent so far.
    pub fn sent(&self) -> Vec<SentItem> {
        self.sent.lock().expect("mock lock poisoned").clone()
    }

    /// Number of plain messages delivered to `chat`.
    pub fn messages_to(&self, chat: AccountId) -> usize {
        self.sent()
            .iter()
            .filter(|item| matches!(item, SentItem::Message { chat: c, .. } if *c == chat))
            .count()
    }

    /// Deleted message handles, in order.
    pub fn deleted(&self) -> Vec<MessageHandle> {
        self.sent()
            .into_iter()
            .filter_map(|item| match item {
                SentItem::Delete { handle } => Some(handle),
                _ => None,
            })
            .collect()
    }

    fn check_blocked(&self, chat: AccountId) -> Result<(), TransportError> {
        if self
            .blocked
            .lock()
            .expect("mock lock poisoned")
            .contains(&chat)
        {
            return Err(TransportError::Blocked("blocked by recipient".to_owned()));
        }
        Ok(())
    }

    fn handle_for(&self, chat: AccountId) -> MessageHandle {
        MessageHandle {
            chat,
            message_id: self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(
        &self,
        chat: AccountId,
        text: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.check_blocked(chat)?;
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(SentItem::Message {
                chat,
                text: text.to_owned(),
            });
        Ok(self.handle_for(chat))
    }

    async fn send_photo(
        &self,
        chat: AccountId,
        _png: Vec<u8>,
        caption: &str,
    ) -> Result<MessageHandle, TransportError> {
        self.check_blocked(chat)?;
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(SentItem::Photo {
                chat,
                caption: caption.to_owned(),
            });
        Ok(self.handle_for(chat))
    }

    async fn edit_message(
        &self,
        handle: &MessageHandle,
        text: &str,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(SentItem::Edit {
                handle: handle.clone(),
                text: text.to_owned(),
            });
        Ok(())
    }

    async fn delete_message(&self, handle: &MessageHandle) -> Result<(), TransportError> {
        self.sent
            .lock()
            .expect("mock lock poisoned")
            .push(SentItem::Delete {
                handle: handle.clone(),
            });
        Ok(())
    }
}
