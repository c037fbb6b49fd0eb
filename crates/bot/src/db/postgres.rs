//! `PostgreSQL` ledger store.
//!
//! Every shared-state mutation here is a single conditional statement:
//! balance debits compare-and-decrement in the `WHERE` clause, unit claims
//! use `FOR UPDATE SKIP LOCKED`, and the intent confirm/expire guards race
//! on the same two boolean columns so exactly one of them can win.
//!
//! Queries use the runtime-checked sqlx API; statuses are stored as text
//! and mapped explicitly, with bad values surfacing as `DataCorruption`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

use saldo_core::{
    AccountId, AccountStage, CredentialPair, IntentId, IntentStatus, Money, UnitId, UnitStatus,
};

use crate::models::{Account, InventoryUnit, NewPaymentIntent, PaymentIntent};
use crate::telegram::MessageHandle;

use super::{LedgerStore, StoreError};

/// Ledger store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying pool (readiness checks).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn stage_to_str(stage: AccountStage) -> &'static str {
    match stage {
        AccountStage::Idle => "idle",
        AccountStage::AwaitingRechargeAmount => "awaiting_recharge_amount",
        AccountStage::AwaitingStockUpload => "awaiting_stock_upload",
        AccountStage::AwaitingStockRemoval => "awaiting_stock_removal",
    }
}

fn stage_from_str(s: &str) -> Result<AccountStage, StoreError> {
    match s {
        "idle" => Ok(AccountStage::Idle),
        "awaiting_recharge_amount" => Ok(AccountStage::AwaitingRechargeAmount),
        "awaiting_stock_upload" => Ok(AccountStage::AwaitingStockUpload),
        "awaiting_stock_removal" => Ok(AccountStage::AwaitingStockRemoval),
        other => Err(StoreError::DataCorruption(format!(
            "invalid account stage: {other}"
        ))),
    }
}

fn unit_status_from_str(s: &str) -> Result<UnitStatus, StoreError> {
    match s {
        "available" => Ok(UnitStatus::Available),
        "claimed" => Ok(UnitStatus::Claimed),
        "sold" => Ok(UnitStatus::Sold),
        other => Err(StoreError::DataCorruption(format!(
            "invalid unit status: {other}"
        ))),
    }
}

fn intent_status_from_str(s: &str) -> Result<IntentStatus, StoreError> {
    match s {
        "created" => Ok(IntentStatus::Created),
        "confirmed" => Ok(IntentStatus::Confirmed),
        "expired" => Ok(IntentStatus::Expired),
        other => Err(StoreError::DataCorruption(format!(
            "invalid intent status: {other}"
        ))),
    }
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let cart_quantity: i32 = row.try_get("cart_quantity")?;
    let stage: String = row.try_get("stage")?;
    Ok(Account {
        id: row.try_get("id")?,
        balance: row.try_get("balance")?,
        cart_quantity: u32::try_from(cart_quantity)
            .map_err(|_| StoreError::DataCorruption("negative cart quantity".to_owned()))?,
        stage: stage_from_str(&stage)?,
        created_at: row.try_get("created_at")?,
    })
}

fn unit_from_row(row: &PgRow) -> Result<InventoryUnit, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(InventoryUnit {
        id: row.try_get("id")?,
        credential: CredentialPair {
            login: row.try_get("login")?,
            password: row.try_get("password")?,
        },
        status: unit_status_from_str(&status)?,
        sold_to: row.try_get("sold_to")?,
    })
}

fn intent_from_row(row: &PgRow) -> Result<PaymentIntent, StoreError> {
    let status: String = row.try_get("status")?;
    let qr_chat_id: Option<i64> = row.try_get("qr_chat_id")?;
    let qr_message_id: Option<i64> = row.try_get("qr_message_id")?;
    let qr_message = match (qr_chat_id, qr_message_id) {
        (Some(chat), Some(message_id)) => Some(MessageHandle {
            chat: AccountId::new(chat),
            message_id,
        }),
        _ => None,
    };
    Ok(PaymentIntent {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        provider_reference: row.try_get("provider_reference")?,
        status: intent_status_from_str(&status)?,
        confirmed: row.try_get("confirmed")?,
        cancelled: row.try_get("cancelled")?,
        qr_message,
        created_at: row.try_get("created_at")?,
    })
}

const INTENT_COLUMNS: &str = "id, account_id, amount, provider_reference, status, \
     confirmed, cancelled, qr_chat_id, qr_message_id, created_at";

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_or_create_account(&self, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query(
            "INSERT INTO account (id) VALUES ($1)
             ON CONFLICT (id) DO UPDATE SET updated_at = now()
             RETURNING id, balance, cart_quantity, stage, created_at",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        account_from_row(&row)
    }

    async fn account_ids(&self) -> Result<Vec<AccountId>, StoreError> {
        let ids = sqlx::query_scalar::<_, AccountId>("SELECT id FROM account ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn credit(&self, id: AccountId, amount: Money) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO account (id, balance) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE
             SET balance = account.balance + EXCLUDED.balance, updated_at = now()",
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_debit(&self, id: AccountId, amount: Money) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE account
             SET balance = balance - $2, updated_at = now()
             WHERE id = $1 AND balance >= $2",
        )
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_cart_quantity(&self, id: AccountId, quantity: u32) -> Result<(), StoreError> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| StoreError::Conflict(format!("cart quantity {quantity} out of range")))?;
        let result = sqlx::query(
            "UPDATE account SET cart_quantity = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_stage(&self, id: AccountId, stage: AccountStage) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE account SET stage = $2, updated_at = now() WHERE id = $1")
                .bind(id)
                .bind(stage_to_str(stage))
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn claim_units(&self, quantity: u32) -> Result<Vec<InventoryUnit>, StoreError> {
        // SKIP LOCKED keeps two concurrent claims from ever selecting the
        // same row; each claimed unit belongs to exactly one caller.
        let rows = sqlx::query(
            "UPDATE inventory_unit SET status = 'claimed'
             WHERE id IN (
                 SELECT id FROM inventory_unit
                 WHERE status = 'available'
                 ORDER BY id
                 LIMIT $1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, login, password, status, sold_to",
        )
        .bind(i64::from(quantity))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(unit_from_row).collect()
    }

    async fn mark_units_sold(&self, ids: &[UnitId], buyer: AccountId) -> Result<(), StoreError> {
        let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        sqlx::query(
            "UPDATE inventory_unit
             SET status = 'sold', sold_to = $2, sold_at = now()
             WHERE id = ANY($1) AND status = 'claimed'",
        )
        .bind(&raw)
        .bind(buyer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release_units(&self, ids: &[UnitId]) -> Result<(), StoreError> {
        let raw: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();
        sqlx::query(
            "UPDATE inventory_unit SET status = 'available'
             WHERE id = ANY($1) AND status = 'claimed'",
        )
        .bind(&raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn available_units(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM inventory_unit WHERE status = 'available'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn add_units(&self, credentials: &[CredentialPair]) -> Result<u64, StoreError> {
        let logins: Vec<String> = credentials.iter().map(|c| c.login.clone()).collect();
        let passwords: Vec<String> = credentials.iter().map(|c| c.password.clone()).collect();
        let result = sqlx::query(
            "INSERT INTO inventory_unit (login, password)
             SELECT * FROM UNNEST($1::text[], $2::text[])",
        )
        .bind(&logins)
        .bind(&passwords)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_sold_units(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM inventory_unit WHERE status = 'sold'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn unit_price(&self) -> Result<Money, StoreError> {
        let price = sqlx::query_scalar::<_, Money>(
            "SELECT unit_price FROM pricing_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        price.ok_or(StoreError::NotFound)
    }

    async fn set_unit_price(&self, price: Money) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO pricing_config (id, unit_price) VALUES (1, $1)
             ON CONFLICT (id) DO UPDATE
             SET unit_price = EXCLUDED.unit_price, updated_at = now()",
        )
        .bind(price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO payment_intent (id, account_id, amount, provider_reference)
             VALUES ($1, $2, $3, $4)
             RETURNING {INTENT_COLUMNS}"
        ))
        .bind(intent.id)
        .bind(intent.account_id)
        .bind(intent.amount)
        .bind(&intent.provider_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("provider reference already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        intent_from_row(&row)
    }

    async fn find_intent_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentIntent>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intent WHERE provider_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(intent_from_row).transpose()
    }

    async fn set_intent_artifact(
        &self,
        id: IntentId,
        message: &MessageHandle,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE payment_intent SET qr_chat_id = $2, qr_message_id = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(message.chat)
        .bind(message.message_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn confirm_intent(&self, id: IntentId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE payment_intent SET status = 'confirmed', confirmed = TRUE
             WHERE id = $1 AND confirmed = FALSE AND cancelled = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn expire_intent(&self, id: IntentId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE payment_intent SET status = 'expired', cancelled = TRUE
             WHERE id = $1 AND confirmed = FALSE AND cancelled = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stale_intents(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<PaymentIntent>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {INTENT_COLUMNS} FROM payment_intent
             WHERE status = 'created' AND confirmed = FALSE AND cancelled = FALSE
               AND created_at < $1
             ORDER BY created_at"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(intent_from_row).collect()
    }
}
