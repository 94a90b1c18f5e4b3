//! `finbook-fx` — point-in-time currency conversion.
//!
//! Pure domain logic only: a time-indexed rate table, a provider abstraction for
//! injecting it, and the conversion function. No IO, no HTTP, no persistence.

pub mod convert;
pub mod error;
pub mod provider;
pub mod table;

pub use convert::{Conversion, convert, to_reference};
pub use error::FxError;
pub use provider::{RateProvider, SharedRateTable};
pub use table::{RateSnapshot, RateTable};
