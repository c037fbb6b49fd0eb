//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::BotConfig;
use crate::db::LedgerStore;
use crate::pix::PixProvider;
use crate::services::{Broadcaster, PurchaseOrchestrator, RechargeService, ReconcileService};
use crate::telegram::ChatTransport;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. It is the composition root:
/// every service is wired here from the store, provider and transport
/// implementations, so a presentation layer (or a test) can swap any of
/// them without touching the services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BotConfig,
    store: Arc<dyn LedgerStore>,
    pool: Option<PgPool>,
    purchase: PurchaseOrchestrator,
    recharge: RechargeService,
    reconcile: ReconcileService,
    broadcaster: Broadcaster,
}

impl AppState {
    /// Wire up the full service stack.
    ///
    /// `pool` is the readiness-probe handle; pass `None` when running
    /// against the in-memory store.
    #[must_use]
    pub fn new(
        config: BotConfig,
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn PixProvider>,
        transport: Arc<dyn ChatTransport>,
        pool: Option<PgPool>,
    ) -> Self {
        let purchase = PurchaseOrchestrator::new(Arc::clone(&store), Arc::clone(&transport));
        let recharge = RechargeService::new(
            Arc::clone(&store),
            Arc::clone(&provider),
            Arc::clone(&transport),
        );
        let reconcile =
            ReconcileService::new(Arc::clone(&store), provider, Arc::clone(&transport));
        let broadcaster = Broadcaster::new(Arc::clone(&store), transport);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                pool,
                purchase,
                recharge,
                reconcile,
                broadcaster,
            }),
        }
    }

    /// Get a reference to the bot configuration.
    #[must_use]
    pub fn config(&self) -> &BotConfig {
        &self.inner.config
    }

    /// Get a reference to the ledger store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.inner.store
    }

    /// Get the database pool, if running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Get a reference to the purchase orchestrator.
    #[must_use]
    pub fn purchase(&self) -> &PurchaseOrchestrator {
        &self.inner.purchase
    }

    /// Get a reference to the recharge service.
    #[must_use]
    pub fn recharge(&self) -> &RechargeService {
        &self.inner.recharge
    }

    /// Get a reference to the reconciliation service.
    #[must_use]
    pub fn reconcile(&self) -> &ReconcileService {
        &self.inner.reconcile
    }

    /// Get a reference to the broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }
}
