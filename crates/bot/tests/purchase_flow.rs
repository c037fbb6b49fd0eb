//! Purchase flow integration tests against the in-memory ledger.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use saldo_bot::db::{LedgerStore, MemoryLedgerStore};
use saldo_bot::services::{PurchaseOrchestrator, PurchaseOutcome};
use saldo_bot::telegram::{MockTransport, SentItem};
use saldo_core::{AccountId, CredentialPair, Money, UnitStatus};

fn credentials(count: usize) -> Vec<CredentialPair> {
    (0..count)
        .map(|i| CredentialPair {
            login: format!("user{i}"),
            password: format!("pw{i}"),
        })
        .collect()
}

struct Harness {
    store: Arc<MemoryLedgerStore>,
    transport: Arc<MockTransport>,
    purchase: PurchaseOrchestrator,
}

fn harness(unit_price: Money) -> Harness {
    let store = Arc::new(MemoryLedgerStore::new(unit_price));
    let transport = Arc::new(MockTransport::new());
    let purchase = PurchaseOrchestrator::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&transport) as _,
    );
    Harness {
        store,
        transport,
        purchase,
    }
}

#[tokio::test]
async fn delivers_and_debits_exactly_the_quote() {
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(1);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store.add_units(&credentials(25)).await.unwrap();

    let outcome = h.purchase.purchase(buyer, 5).await.unwrap();
    let PurchaseOutcome::Delivered { units, total } = outcome else {
        panic!("expected delivery, got {outcome:?}");
    };

    assert_eq!(total, Money::from_cents(350));
    assert_eq!(units.len(), 5);
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(650));
    for unit in &units {
        assert_eq!(h.store.unit_status(unit.id).await, Some(UnitStatus::Sold));
    }
    // cart resets for the next flow
    let account = h.store.get_or_create_account(buyer).await.unwrap();
    assert_eq!(account.cart_quantity, 1);
    // the credentials were presented
    assert_eq!(h.transport.messages_to(buyer), 1);
}

#[tokio::test]
async fn insufficient_balance_touches_nothing() {
    // 10.00 balance, 0.70/unit, quantity 20 -> quote 14.00 exceeds balance
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(7);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store.add_units(&credentials(25)).await.unwrap();

    let outcome = h.purchase.purchase(buyer, 20).await.unwrap();
    let PurchaseOutcome::InsufficientBalance { balance, required } = outcome else {
        panic!("expected insufficient balance, got {outcome:?}");
    };

    assert_eq!(balance, Money::from_cents(1000));
    assert_eq!(required, Money::from_cents(1400));
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(1000));
    assert_eq!(h.store.available_units().await.unwrap(), 25);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn stock_shortfall_refunds_the_full_debit() {
    // 10.00 balance, 0.70/unit, quantity 5 but only 3 units in stock
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(9);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store.add_units(&credentials(3)).await.unwrap();

    let outcome = h.purchase.purchase(buyer, 5).await.unwrap();
    let PurchaseOutcome::InsufficientStock { available } = outcome else {
        panic!("expected insufficient stock, got {outcome:?}");
    };

    assert_eq!(available, 3);
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(1000));
    // the claimed units went back on the shelf
    assert_eq!(h.store.available_units().await.unwrap(), 3);
}

#[tokio::test]
async fn claim_failure_refunds_the_debit_before_the_error_surfaces() {
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(10);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store.add_units(&credentials(5)).await.unwrap();
    h.store.fail_claims(true).await;

    assert!(h.purchase.purchase(buyer, 5).await.is_err());
    // the debit was unwound before the error reached the caller
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(1000));
    assert_eq!(h.store.available_units().await.unwrap(), 5);
    assert!(h.transport.sent().is_empty());

    // once the store recovers, the same purchase goes through cleanly
    h.store.fail_claims(false).await;
    let outcome = h.purchase.purchase(buyer, 5).await.unwrap();
    assert!(matches!(outcome, PurchaseOutcome::Delivered { .. }));
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(650));
}

#[tokio::test]
async fn presentation_failure_never_unwinds_the_sale() {
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(11);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store.add_units(&credentials(5)).await.unwrap();
    h.transport.block(buyer);

    let outcome = h.purchase.purchase(buyer, 2).await.unwrap();
    assert!(matches!(outcome, PurchaseOutcome::Delivered { .. }));
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(860));
    assert_eq!(h.store.available_units().await.unwrap(), 3);
}

#[tokio::test]
async fn rejects_zero_quantity() {
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(13);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;

    assert!(h.purchase.purchase(buyer, 0).await.is_err());
    assert_eq!(h.store.balance(buyer).await, Money::from_cents(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_overdraw() {
    // Balance covers exactly one unit; ten racers, one winner.
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(21);
    h.store.seed_account(buyer, Money::from_cents(70)).await;
    h.store.add_units(&credentials(10)).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let purchase = h.purchase.clone();
        tasks.push(tokio::spawn(
            async move { purchase.purchase(buyer, 1).await },
        ));
    }

    let mut delivered = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            PurchaseOutcome::Delivered { .. } => delivered += 1,
            PurchaseOutcome::InsufficientBalance { .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(delivered, 1);
    assert_eq!(h.store.balance(buyer).await, Money::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_purchases_never_share_a_unit() {
    let h = harness(Money::from_cents(10));
    h.store.add_units(&credentials(12)).await.unwrap();

    let mut tasks = Vec::new();
    for buyer in 1..=4_i64 {
        let (purchase, store) = (h.purchase.clone(), Arc::clone(&h.store));
        tasks.push(tokio::spawn(async move {
            let buyer = AccountId::from(buyer);
            store.seed_account(buyer, Money::from_cents(1000)).await;
            purchase.purchase(buyer, 3).await
        }));
    }

    let mut logins = Vec::new();
    for task in tasks {
        let PurchaseOutcome::Delivered { units, .. } = task.await.unwrap().unwrap() else {
            panic!("all four purchases should be deliverable");
        };
        logins.extend(units.into_iter().map(|unit| unit.credential.login));
    }

    logins.sort_unstable();
    let before = logins.len();
    logins.dedup();
    assert_eq!(before, logins.len(), "a unit was delivered twice");
    assert_eq!(h.store.available_units().await.unwrap(), 0);
}

#[tokio::test]
async fn delivery_message_carries_the_plain_credentials() {
    let h = harness(Money::from_cents(70));
    let buyer = AccountId::from(31);
    h.store.seed_account(buyer, Money::from_cents(1000)).await;
    h.store
        .add_units(&[CredentialPair {
            login: "alice@mail.com".to_owned(),
            password: "hunter2".to_owned(),
        }])
        .await
        .unwrap();

    h.purchase.purchase(buyer, 1).await.unwrap();

    let sent = h.transport.sent();
    let Some(SentItem::Message { text, .. }) = sent.first() else {
        panic!("expected one delivery message");
    };
    assert!(text.contains("alice@mail.com:hunter2"));
}
