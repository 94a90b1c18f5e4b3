//! `finbook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the domain error taxonomy, the supported currency
//! set, and integer minor-unit money handling.

pub mod currency;
pub mod error;
pub mod id;
pub mod money;

pub use currency::Currency;
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, BorrowingId, ShiftId, TransactionId, UserId};
pub use money::{SANITY_CEILING_MINOR, major_string, minor_from_major_str};
