//! Saldo Core - Shared types library.
//!
//! This crate provides common types used across all Saldo components:
//! - `bot` - The storefront bot service (settlement, allocation, reconciliation)
//! - `cli` - Command-line tools for migrations and inventory management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, credentials, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
