//! Service layer: the business operations composed from store primitives.
//!
//! Services own no concurrency machinery of their own. Every contended
//! decision (can this debit happen, who gets this unit, who confirms this
//! intent) is a single atomic store call; the services sequence those calls
//! and run compensation when a later step cannot proceed.

pub mod allocator;
pub mod notify;
pub mod purchase;
pub mod recharge;
pub mod reconcile;
pub mod settlement;
pub mod sweeper;

pub use allocator::{Claim, InventoryAllocator};
pub use notify::Broadcaster;
pub use purchase::{PurchaseOrchestrator, PurchaseOutcome};
pub use recharge::RechargeService;
pub use reconcile::{ReconcileOutcome, ReconcileService};
pub use settlement::{Debit, Settlement};
pub use sweeper::ExpirySweeper;
