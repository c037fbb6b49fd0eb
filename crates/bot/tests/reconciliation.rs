//! Payment reconciliation and recharge integration tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use saldo_bot::db::{LedgerStore, MemoryLedgerStore};
use saldo_bot::error::AppError;
use saldo_bot::models::NewPaymentIntent;
use saldo_bot::pix::{ChargeStatus, MockProvider};
use saldo_bot::services::{RechargeService, ReconcileOutcome, ReconcileService};
use saldo_bot::telegram::{MockTransport, SentItem};
use saldo_core::{AccountId, IntentId, Money};

struct Harness {
    store: Arc<MemoryLedgerStore>,
    provider: Arc<MockProvider>,
    transport: Arc<MockTransport>,
    reconcile: ReconcileService,
    recharge: RechargeService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryLedgerStore::new(Money::from_cents(70)));
    let provider = Arc::new(MockProvider::new());
    let transport = Arc::new(MockTransport::new());
    let reconcile = ReconcileService::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&provider) as _,
        Arc::clone(&transport) as _,
    );
    let recharge = RechargeService::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&provider) as _,
        Arc::clone(&transport) as _,
    );
    Harness {
        store,
        provider,
        transport,
        reconcile,
        recharge,
    }
}

/// Insert a pending intent the way the recharge flow would, minus the chat.
async fn seed_intent(h: &Harness, account: AccountId, amount: Money, reference: &str) -> IntentId {
    let intent = h
        .store
        .insert_intent(NewPaymentIntent {
            id: IntentId::generate(),
            account_id: account,
            amount,
            provider_reference: reference.to_owned(),
        })
        .await
        .unwrap();
    h.provider.set_status(reference, ChargeStatus::Pending);
    intent.id
}

#[tokio::test]
async fn approved_charge_credits_once_and_notifies() {
    let h = harness();
    let account = AccountId::from(1);
    seed_intent(&h, account, Money::from_cents(500), "900").await;
    h.provider.set_status("900", ChargeStatus::Approved);

    let outcome = h.reconcile.handle_notification("900").await.unwrap();
    assert_eq!(
        outcome,
        ReconcileOutcome::Credited {
            account,
            amount: Money::from_cents(500),
        }
    );
    assert_eq!(h.store.balance(account).await, Money::from_cents(500));
    assert_eq!(h.transport.messages_to(account), 1);
}

#[tokio::test]
async fn double_notification_credits_exactly_once() {
    // Reference "123", amount 20.00, notified twice.
    let h = harness();
    let account = AccountId::from(2);
    seed_intent(&h, account, Money::from_cents(2000), "123").await;
    h.provider.set_status("123", ChargeStatus::Approved);

    let first = h.reconcile.handle_notification("123").await.unwrap();
    let second = h.reconcile.handle_notification("123").await.unwrap();

    assert!(matches!(first, ReconcileOutcome::Credited { .. }));
    assert_eq!(second, ReconcileOutcome::Duplicate);
    assert_eq!(h.store.balance(account).await, Money::from_cents(2000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_credit_exactly_once() {
    let h = harness();
    let account = AccountId::from(3);
    seed_intent(&h, account, Money::from_cents(1000), "777").await;
    h.provider.set_status("777", ChargeStatus::Approved);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let reconcile = h.reconcile.clone();
        tasks.push(tokio::spawn(async move {
            reconcile.handle_notification("777").await
        }));
    }

    let mut credited = 0;
    for task in tasks {
        if matches!(
            task.await.unwrap().unwrap(),
            ReconcileOutcome::Credited { .. }
        ) {
            credited += 1;
        }
    }

    assert_eq!(credited, 1);
    assert_eq!(h.store.balance(account).await, Money::from_cents(1000));
}

#[tokio::test]
async fn unknown_reference_is_ignored() {
    let h = harness();
    let outcome = h.reconcile.handle_notification("nope").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Unknown);
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn unapproved_charge_leaves_the_intent_pending() {
    let h = harness();
    let account = AccountId::from(4);
    let intent_id = seed_intent(&h, account, Money::from_cents(400), "55").await;

    let outcome = h.reconcile.handle_notification("55").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::NotApproved);
    assert_eq!(h.store.balance(account).await, Money::ZERO);
    assert!(h.store.intent(intent_id).await.unwrap().is_pending());

    // the charge settles later and a fresh notification lands
    h.provider.set_status("55", ChargeStatus::Approved);
    let outcome = h.reconcile.handle_notification("55").await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));
    assert_eq!(h.store.balance(account).await, Money::from_cents(400));
}

#[tokio::test]
async fn provider_outage_drops_the_notification_without_state_change() {
    let h = harness();
    let account = AccountId::from(5);
    let intent_id = seed_intent(&h, account, Money::from_cents(600), "88").await;
    h.provider.set_status("88", ChargeStatus::Approved);

    h.provider.set_unavailable(true);
    let result = h.reconcile.handle_notification("88").await;
    assert!(matches!(result, Err(AppError::Provider(_))));
    assert_eq!(h.store.balance(account).await, Money::ZERO);
    assert!(h.store.intent(intent_id).await.unwrap().is_pending());

    // redelivery after the outage succeeds
    h.provider.set_unavailable(false);
    let outcome = h.reconcile.handle_notification("88").await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));
    assert_eq!(h.store.balance(account).await, Money::from_cents(600));
}

#[tokio::test]
async fn every_notification_requeries_the_authoritative_status() {
    let h = harness();
    seed_intent(&h, AccountId::from(6), Money::from_cents(300), "66").await;

    h.reconcile.handle_notification("66").await.unwrap();
    h.reconcile.handle_notification("66").await.unwrap();
    assert_eq!(h.provider.status_queries(), 2);
}

// ----- recharge -----

#[tokio::test]
async fn recharge_creates_a_reconcilable_intent_with_qr() {
    let h = harness();
    let account = AccountId::from(10);

    let intent = h
        .recharge
        .start(account, Money::from_cents(2000))
        .await
        .unwrap();

    assert_eq!(intent.amount, Money::from_cents(2000));
    assert!(intent.qr_message.is_some());
    let sent = h.transport.sent();
    assert!(matches!(sent.first(), Some(SentItem::Photo { .. })));

    // the stored intent reconciles through the provider reference
    let reference = intent.provider_reference.clone().unwrap();
    h.provider.set_status(&reference, ChargeStatus::Approved);
    let outcome = h.reconcile.handle_notification(&reference).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Credited { .. }));
    assert_eq!(h.store.balance(account).await, Money::from_cents(2000));
    // the QR message was retracted on confirmation
    assert_eq!(h.transport.deleted().len(), 1);
}

#[tokio::test]
async fn recharge_rejects_amounts_below_the_minimum() {
    let h = harness();
    let result = h
        .recharge
        .start(AccountId::from(11), Money::from_cents(299))
        .await;
    assert!(matches!(result, Err(AppError::AmountBelowMinimum { .. })));
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn recharge_persists_nothing_when_the_charge_fails() {
    let h = harness();
    h.provider.set_unavailable(true);

    let result = h
        .recharge
        .start(AccountId::from(12), Money::from_cents(500))
        .await;
    assert!(matches!(result, Err(AppError::Provider(_))));

    // no pending intent exists anywhere
    let pending = h
        .store
        .stale_intents(chrono::Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert!(pending.is_empty());
}
