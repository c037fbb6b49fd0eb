//! Core types for Saldo.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod credential;
pub mod id;
pub mod money;
pub mod status;

pub use credential::{CredentialError, CredentialPair};
pub use id::*;
pub use money::{Money, MoneyError};
pub use status::*;
