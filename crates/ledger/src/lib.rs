//! `finbook-ledger` — ledger domain logic.
//!
//! Pure domain logic only: accounts and their balance rules, transaction kinds
//! and signed balance effects, the borrowing payment state machine, and
//! work-shift earnings arithmetic. No IO, no HTTP, no persistence concerns.

pub mod account;
pub mod borrowing;
pub mod error;
pub mod shift;
pub mod transaction;

pub use account::{Account, AccountKind};
pub use borrowing::{Borrowing, BorrowingStatus, Direction, status_of};
pub use error::LedgerError;
pub use shift::WorkShift;
pub use transaction::{Transaction, TransactionKind, validate_amount};
