//! `finbook-store` — Postgres persistence.
//!
//! Repositories over sqlx with owner isolation in every query, versioned
//! migrations, and multi-record SQL transactions for every ledger-affecting
//! write: a transaction record and its account balance always commit or roll
//! back together.

pub mod accounts;
pub mod borrowings;
pub mod dashboard;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod rates;
pub mod shifts;
pub mod transactions;
pub mod users;

#[cfg(test)]
mod integration_tests;

pub use accounts::{AccountDeletion, AccountRepo, NewAccount};
pub use borrowings::{BorrowingRepo, BorrowingUpdate, NewBorrowing};
pub use dashboard::{CurrencyTotal, DashboardRepo, DashboardSummary};
pub use error::StoreError;
pub use rates::RateStore;
pub use shifts::{NewShift, ShiftRepo, ShiftUpdate};
pub use transactions::{
    NewTransaction, NewTransfer, TransactionFilter, TransactionRepo, TransactionUpdate,
};
pub use users::{NewUser, UserRecord, UserRepo};
