//! Status enums for ledger entities.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an inventory unit.
///
/// `Claimed` is the soft reservation held between a successful balance
/// debit and final delivery; it is released back to `Available` if the
/// purchase cannot complete. A unit is `Sold` if and only if it has been
/// delivered to exactly one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    #[default]
    Available,
    Claimed,
    Sold,
}

/// Lifecycle status of a payment intent.
///
/// `Created` has exactly two terminal successors, `Confirmed` and
/// `Expired`, and at most one transition out of `Created` ever succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    #[default]
    Created,
    Confirmed,
    Expired,
}

/// Per-account conversation stage.
///
/// Replaces the original ambient "awaiting input" process maps with an
/// explicit persisted field, so a restart (or a second instance) does not
/// forget what the account was asked for. The chat layer reads and writes
/// this; the core only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStage {
    #[default]
    Idle,
    AwaitingRechargeAmount,
    AwaitingStockUpload,
    AwaitingStockRemoval,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&UnitStatus::Available).unwrap(),
            "\"available\""
        );
        assert_eq!(
            serde_json::to_string(&IntentStatus::Expired).unwrap(),
            "\"expired\""
        );
        assert_eq!(
            serde_json::to_string(&AccountStage::AwaitingRechargeAmount).unwrap(),
            "\"awaiting_recharge_amount\""
        );
    }
}
