//! Expiry sweeper integration tests.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use saldo_bot::db::{LedgerStore, MemoryLedgerStore};
use saldo_bot::models::NewPaymentIntent;
use saldo_bot::pix::{ChargeStatus, MockProvider};
use saldo_bot::services::{ExpirySweeper, ReconcileOutcome, ReconcileService};
use saldo_bot::telegram::MockTransport;
use saldo_core::{AccountId, IntentId, IntentStatus, Money};

const TTL: Duration = Duration::from_secs(600);

struct Harness {
    store: Arc<MemoryLedgerStore>,
    provider: Arc<MockProvider>,
    transport: Arc<MockTransport>,
    sweeper: ExpirySweeper,
    reconcile: ReconcileService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryLedgerStore::new(Money::from_cents(70)));
    let provider = Arc::new(MockProvider::new());
    let transport = Arc::new(MockTransport::new());
    let sweeper = ExpirySweeper::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&transport) as _,
        TTL,
    );
    let reconcile = ReconcileService::new(
        Arc::clone(&store) as Arc<dyn LedgerStore>,
        Arc::clone(&provider) as _,
        Arc::clone(&transport) as _,
    );
    Harness {
        store,
        provider,
        transport,
        sweeper,
        reconcile,
    }
}

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
async fn expires_stale_intents_and_notifies_once() {
    let h = harness();
    let account = AccountId::from(1);
    let intent_id = seed_intent(&h, account, Money::from_cents(500), "1").await;
    h.store
        .backdate_intent(intent_id, Utc::now() - chrono::Duration::minutes(20))
        .await;

    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 1);
    let intent = h.store.intent(intent_id).await.unwrap();
    assert!(intent.cancelled);
    assert_eq!(intent.status, IntentStatus::Expired);
    assert_eq!(h.transport.messages_to(account), 1);

    // later ticks leave the already-expired intent alone
    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 0);
    assert_eq!(h.transport.messages_to(account), 1);
}

#[tokio::test]
async fn leaves_fresh_intents_alone() {
    let h = harness();
    let intent_id = seed_intent(&h, AccountId::from(2), Money::from_cents(500), "2").await;

    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 0);
    assert!(h.store.intent(intent_id).await.unwrap().is_pending());
}

#[tokio::test]
async fn expired_intent_never_credits_a_late_confirmation() {
    let h = harness();
    let account = AccountId::from(3);
    let intent_id = seed_intent(&h, account, Money::from_cents(800), "3").await;
    h.store
        .backdate_intent(intent_id, Utc::now() - chrono::Duration::minutes(20))
        .await;
    h.provider.set_status("3", ChargeStatus::Approved);

    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 1);

    let outcome = h.reconcile.handle_notification("3").await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Superseded);
    assert_eq!(h.store.balance(account).await, Money::ZERO);
}

#[tokio::test]
async fn confirmed_intent_is_never_expired() {
    let h = harness();
    let account = AccountId::from(4);
    let intent_id = seed_intent(&h, account, Money::from_cents(800), "4").await;
    h.provider.set_status("4", ChargeStatus::Approved);
    h.reconcile.handle_notification("4").await.unwrap();

    h.store
        .backdate_intent(intent_id, Utc::now() - chrono::Duration::minutes(20))
        .await;
    assert_eq!(h.sweeper.sweep_once().await.unwrap(), 0);

    let intent = h.store.intent(intent_id).await.unwrap();
    assert!(intent.confirmed);
    assert!(!intent.cancelled);
    assert_eq!(h.store.balance(account).await, Money::from_cents(800));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn confirm_and_expire_race_has_exactly_one_winner() {
    for round in 0..16_i64 {
        let h = harness();
        let account = AccountId::from(100 + round);
        let reference = format!("race-{round}");
        let intent_id = seed_intent(&h, account, Money::from_cents(900), &reference).await;
        h.store
            .backdate_intent(intent_id, Utc::now() - chrono::Duration::minutes(20))
            .await;
        h.provider.set_status(&reference, ChargeStatus::Approved);

        let sweep = {
            let sweeper = h.sweeper.clone();
            tokio::spawn(async move { sweeper.sweep_once().await })
        };
        let confirm = {
            let reconcile = h.reconcile.clone();
            let reference = reference.clone();
            tokio::spawn(async move { reconcile.handle_notification(&reference).await })
        };

        let expired = sweep.await.unwrap().unwrap();
        let outcome = confirm.await.unwrap().unwrap();

        let intent = h.store.intent(intent_id).await.unwrap();
        match outcome {
            ReconcileOutcome::Credited { .. } => {
                assert_eq!(expired, 0, "round {round}: both guards won");
                assert!(intent.confirmed && !intent.cancelled);
                assert_eq!(h.store.balance(account).await, Money::from_cents(900));
            }
            ReconcileOutcome::Superseded => {
                assert_eq!(expired, 1, "round {round}: neither guard won");
                assert!(intent.cancelled && !intent.confirmed);
                assert_eq!(h.store.balance(account).await, Money::ZERO);
            }
            other => panic!("round {round}: unexpected outcome {other:?}"),
        }
    }
}
