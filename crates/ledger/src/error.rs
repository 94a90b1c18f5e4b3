use thiserror::Error;

use finbook_core::DomainError;

/// Business-rule error raised by ledger operations.
///
/// Every variant aborts the whole unit of work: the caller must leave both the
/// record and the balance unchanged.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// The target account has been deactivated.
    #[error("account is inactive")]
    InactiveAccount,

    /// The mutation would drive a non-credit account's balance negative.
    #[error("insufficient funds: balance {balance} cannot absorb {delta}")]
    InsufficientFunds { balance: i64, delta: i64 },

    /// A borrowing payment would push the paid amount above the principal.
    #[error("payment of {amount} exceeds remaining principal {remaining}")]
    PaymentExceedsPrincipal { amount: i64, remaining: i64 },

    /// The borrowing is already fully paid.
    #[error("borrowing is already settled")]
    BorrowingAlreadySettled,

    /// Integer overflow in balance arithmetic.
    #[error("amount overflow")]
    AmountOverflow,

    #[error(transparent)]
    Domain(#[from] DomainError),
}
