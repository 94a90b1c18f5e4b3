//! Time-indexed exchange-rate table.
//!
//! Rates are quoted against the reference currency: `rate[c]` is the number of
//! units of `c` per one unit of [`Currency::REFERENCE`]. The reference currency
//! itself therefore always carries a rate of exactly 1.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finbook_core::Currency;

use crate::error::FxError;

/// Per-currency rates valid around a single point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub as_of: DateTime<Utc>,
    rates: HashMap<Currency, f64>,
}

impl RateSnapshot {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        let mut rates = HashMap::new();
        rates.insert(Currency::REFERENCE, 1.0);
        Self { as_of, rates }
    }

    /// Builder-style rate insertion (used heavily in tests).
    pub fn with_rate(mut self, currency: Currency, rate: f64) -> Self {
        self.set_rate(currency, rate);
        self
    }

    /// Set the rate for a currency (units per one reference unit).
    ///
    /// The reference currency is pinned to 1 and cannot be overridden.
    pub fn set_rate(&mut self, currency: Currency, rate: f64) {
        if currency == Currency::REFERENCE {
            return;
        }
        self.rates.insert(currency, rate);
    }

    /// Rate for `currency`, or a hard [`FxError::MissingRate`].
    pub fn rate(&self, currency: Currency) -> Result<f64, FxError> {
        match self.rates.get(&currency) {
            Some(r) if r.is_finite() && *r > 0.0 => Ok(*r),
            _ => Err(FxError::MissingRate(currency)),
        }
    }

    pub fn rates(&self) -> &HashMap<Currency, f64> {
        &self.rates
    }
}

/// All loaded snapshots, kept sorted by `as_of`.
///
/// The table is read-only at conversion time; it is replaced or appended to only
/// by the external refresh path (persistence layer / rates endpoint).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    snapshots: Vec<RateSnapshot>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot, replacing any existing one with the same `as_of`.
    pub fn insert(&mut self, snapshot: RateSnapshot) {
        match self
            .snapshots
            .binary_search_by_key(&snapshot.as_of, |s| s.as_of)
        {
            Ok(i) => self.snapshots[i] = snapshot,
            Err(i) => self.snapshots.insert(i, snapshot),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn snapshots(&self) -> &[RateSnapshot] {
        &self.snapshots
    }

    /// Snapshot whose `as_of` is nearest to `at` by absolute time difference.
    ///
    /// Nearest-neighbor only, no interpolation. Ties resolve to the earlier
    /// snapshot.
    pub fn nearest(&self, at: DateTime<Utc>) -> Result<&RateSnapshot, FxError> {
        self.snapshots
            .iter()
            .min_by_key(|s| {
                let delta = s.as_of.signed_duration_since(at);
                delta.abs()
            })
            .ok_or(FxError::NoSnapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn reference_rate_is_always_one() {
        let snap = RateSnapshot::new(at(0)).with_rate(Currency::Usd, 2.0);
        assert_eq!(snap.rate(Currency::Usd).unwrap(), 1.0);
    }

    #[test]
    fn missing_rate_is_a_hard_error() {
        let snap = RateSnapshot::new(at(0));
        assert_eq!(
            snap.rate(Currency::Eur),
            Err(FxError::MissingRate(Currency::Eur))
        );
    }

    #[test]
    fn non_positive_rates_are_treated_as_missing() {
        let snap = RateSnapshot::new(at(0))
            .with_rate(Currency::Eur, 0.0)
            .with_rate(Currency::Gbp, f64::NAN);
        assert!(snap.rate(Currency::Eur).is_err());
        assert!(snap.rate(Currency::Gbp).is_err());
    }

    #[test]
    fn nearest_picks_minimum_absolute_distance() {
        let mut table = RateTable::new();
        table.insert(RateSnapshot::new(at(0)));
        table.insert(RateSnapshot::new(at(10)));

        assert_eq!(table.nearest(at(4)).unwrap().as_of, at(0));
        assert_eq!(table.nearest(at(6)).unwrap().as_of, at(10));
        // Query before the first and after the last snapshot.
        assert_eq!(
            table.nearest(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()).unwrap().as_of,
            at(0)
        );
        assert_eq!(
            table.nearest(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()).unwrap().as_of,
            at(10)
        );
    }

    #[test]
    fn insert_replaces_snapshot_with_same_timestamp() {
        let mut table = RateTable::new();
        table.insert(RateSnapshot::new(at(0)).with_rate(Currency::Eur, 0.9));
        table.insert(RateSnapshot::new(at(0)).with_rate(Currency::Eur, 0.92));
        assert_eq!(table.len(), 1);
        assert_eq!(table.nearest(at(0)).unwrap().rate(Currency::Eur).unwrap(), 0.92);
    }

    #[test]
    fn empty_table_reports_no_snapshots() {
        let table = RateTable::new();
        assert_eq!(table.nearest(at(0)).err(), Some(FxError::NoSnapshots));
    }
}
