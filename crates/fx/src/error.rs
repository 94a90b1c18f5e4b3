use thiserror::Error;

use finbook_core::Currency;

/// Conversion failure.
///
/// A missing rate is always a hard error. The conversion layer never silently
/// substitutes a rate of 1.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FxError {
    /// The rate table holds no snapshots at all.
    #[error("no exchange-rate snapshots loaded")]
    NoSnapshots,

    /// The resolved snapshot has no rate for the given currency.
    #[error("no exchange rate for {0}")]
    MissingRate(Currency),

    /// The converted amount does not fit the supported integer range.
    #[error("converted amount out of range")]
    AmountOutOfRange,
}
