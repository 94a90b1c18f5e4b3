//! Store error model and sqlx error mapping.

use thiserror::Error;

use finbook_core::DomainError;
use finbook_fx::FxError;
use finbook_ledger::LedgerError;

/// Persistence-layer error.
///
/// Domain, ledger, and fx errors pass through unchanged so the API layer can
/// map each taxonomy to a status code exactly once. Any error inside a SQL
/// transaction rolls the whole unit of work back — no partial application.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row absent, or owned by a different user (indistinguishable on purpose).
    #[error("not found")]
    NotFound,

    /// Unique-constraint violation (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Fx(#[from] FxError),

    /// Anything the database driver reports that is not a business condition.
    #[error("database error in {op}: {message}")]
    Database { op: &'static str, message: String },
}

/// Map a sqlx error to the store taxonomy.
///
/// Unique violations (23505) become `Conflict`; `RowNotFound` becomes
/// `NotFound`; everything else is a `Database` error tagged with the operation.
pub(crate) fn map_sqlx_error(op: &'static str, e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict(db.message().to_string())
        }
        other => StoreError::Database {
            op,
            message: other.to_string(),
        },
    }
}
