//! Saldo bot service library.
//!
//! The settlement and inventory-allocation core of a PIX-funded credential
//! storefront:
//!
//! - [`db`] — the ledger store, where every contended mutation is a single
//!   atomic conditional update
//! - [`services`] — allocation, settlement, the purchase saga, payment
//!   reconciliation, intent expiry and broadcasts
//! - [`pix`] / [`telegram`] — the payment provider and chat transport
//!   boundaries, each a trait with a production client and a test mock
//! - [`routes`] — the PIX webhook
//!
//! Chat presentation (menus, keyboards, command routing) is deliberately
//! not here; it consumes this crate's services and transport trait.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pix;
pub mod routes;
pub mod services;
pub mod state;
pub mod telegram;

pub use config::BotConfig;
pub use error::{AppError, Result};
pub use state::AppState;
