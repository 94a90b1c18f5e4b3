//! The conversion function.

use chrono::{DateTime, Utc};

use finbook_core::Currency;

use crate::error::FxError;
use crate::provider::RateProvider;

/// Result of a conversion: the integer amount plus the rates that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    /// Converted amount in minor units of the target currency.
    pub amount: i64,
    /// Effective source→target rate.
    pub rate: f64,
    /// Source→reference rate (reference minor units per source minor unit).
    /// Captured on transactions so historical equivalents never shift.
    pub to_reference: f64,
}

/// Convert `amount` minor units from `from` to `to` at the snapshot nearest to `at`.
///
/// Identical inputs always produce identical output: this is a pure function of
/// its arguments plus the provider's table, which is read-only at call time.
///
/// Same-currency conversions short-circuit with rate exactly 1. Only the
/// reference currency skips the table entirely; any other same-currency pair
/// still needs a snapshot to produce its `to_reference` rate.
pub fn convert(
    provider: &dyn RateProvider,
    amount: i64,
    from: Currency,
    to: Currency,
    at: DateTime<Utc>,
) -> Result<Conversion, FxError> {
    if from == to {
        return Ok(Conversion {
            amount,
            rate: 1.0,
            to_reference: if from == Currency::REFERENCE {
                1.0
            } else {
                1.0 / provider.snapshot_at(at)?.rate(from)?
            },
        });
    }

    let snapshot = provider.snapshot_at(at)?;
    let from_rate = snapshot.rate(from)?;
    let to_rate = snapshot.rate(to)?;

    // amount / rate[from] is the reference-currency value; × rate[to] lands it
    // in the target. Rounded to the nearest integer minor unit.
    let converted = (amount as f64) / from_rate * to_rate;
    let rounded = converted.round();
    if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
        return Err(FxError::AmountOutOfRange);
    }

    Ok(Conversion {
        amount: rounded as i64,
        rate: to_rate / from_rate,
        to_reference: 1.0 / from_rate,
    })
}

/// Convert into the reference currency (the captured-equivalent path).
pub fn to_reference(
    provider: &dyn RateProvider,
    amount: i64,
    from: Currency,
    at: DateTime<Utc>,
) -> Result<Conversion, FxError> {
    convert(provider, amount, from, Currency::REFERENCE, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{RateSnapshot, RateTable};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn june(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn table() -> RateTable {
        let mut t = RateTable::new();
        t.insert(
            RateSnapshot::new(june(1))
                .with_rate(Currency::Eur, 0.92)
                .with_rate(Currency::Gbp, 0.79)
                .with_rate(Currency::Cad, 1.36),
        );
        t
    }

    #[test]
    fn same_currency_returns_amount_unchanged_with_rate_one() {
        // Works even with an empty table for the reference currency.
        let empty = RateTable::new();
        let c = convert(&empty, 7525, Currency::Usd, Currency::Usd, june(1)).unwrap();
        assert_eq!(c.amount, 7525);
        assert_eq!(c.rate, 1.0);
        assert_eq!(c.to_reference, 1.0);
    }

    #[test]
    fn eur_to_usd_matches_expected_scenario() {
        // 100.00 EUR at 0.92 EUR/USD → round(10000 / 0.92) = 10870 cents.
        let c = convert(&table(), 10_000, Currency::Eur, Currency::Usd, june(1)).unwrap();
        assert_eq!(c.amount, 10_870);
        assert!((c.to_reference - 1.0 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn cross_rate_goes_through_the_reference() {
        // EUR→GBP = amount / 0.92 × 0.79.
        let c = convert(&table(), 10_000, Currency::Eur, Currency::Gbp, june(1)).unwrap();
        assert_eq!(c.amount, (10_000f64 / 0.92 * 0.79).round() as i64);
        assert!((c.rate - 0.79 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn missing_currency_fails_hard() {
        let err = convert(&table(), 100, Currency::Inr, Currency::Usd, june(1)).unwrap_err();
        assert_eq!(err, FxError::MissingRate(Currency::Inr));

        let err = convert(&table(), 100, Currency::Usd, Currency::Chf, june(1)).unwrap_err();
        assert_eq!(err, FxError::MissingRate(Currency::Chf));
    }

    #[test]
    fn non_reference_identity_still_needs_a_snapshot() {
        // EUR→EUR keeps the amount but must capture a reference equivalent.
        let empty = RateTable::new();
        let err = convert(&empty, 100, Currency::Eur, Currency::Eur, june(1)).unwrap_err();
        assert_eq!(err, FxError::NoSnapshots);

        let c = convert(&table(), 100, Currency::Eur, Currency::Eur, june(1)).unwrap();
        assert_eq!(c.amount, 100);
        assert_eq!(c.rate, 1.0);
        assert!((c.to_reference - 1.0 / 0.92).abs() < 1e-12);
    }

    #[test]
    fn empty_table_fails_for_cross_currency() {
        let empty = RateTable::new();
        let err = convert(&empty, 100, Currency::Eur, Currency::Usd, june(1)).unwrap_err();
        assert_eq!(err, FxError::NoSnapshots);
    }

    #[test]
    fn uses_the_snapshot_nearest_to_the_effective_date() {
        let mut t = table();
        t.insert(RateSnapshot::new(june(10)).with_rate(Currency::Eur, 0.80));

        let early = convert(&t, 10_000, Currency::Eur, Currency::Usd, june(2)).unwrap();
        let late = convert(&t, 10_000, Currency::Eur, Currency::Usd, june(9)).unwrap();
        assert_eq!(early.amount, 10_870); // 0.92 snapshot
        assert_eq!(late.amount, 12_500); // 0.80 snapshot
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let t = table();
        let a = convert(&t, 31_337, Currency::Gbp, Currency::Cad, june(1)).unwrap();
        let b = convert(&t, 31_337, Currency::Gbp, Currency::Cad, june(1)).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        /// A→B→A with the same effective date returns the original within ±1
        /// minor unit, for rates within the supported band.
        #[test]
        fn round_trip_is_within_one_minor_unit(
            amount in 0i64..1_000_000_00,
            // Keeps the pair's cross rate within [0.5, 2]; beyond that a single
            // minor unit cannot absorb the first rounding step.
            from_rate in 0.7f64..1.4,
            to_rate in 0.7f64..1.4,
        ) {
            let mut t = RateTable::new();
            t.insert(
                RateSnapshot::new(june(1))
                    .with_rate(Currency::Eur, from_rate)
                    .with_rate(Currency::Gbp, to_rate),
            );

            let there = convert(&t, amount, Currency::Eur, Currency::Gbp, june(1)).unwrap();
            let back = convert(&t, there.amount, Currency::Gbp, Currency::Eur, june(1)).unwrap();
            prop_assert!((back.amount - amount).abs() <= 1);
        }

        /// Same-currency conversion is exact for every representable amount.
        #[test]
        fn identity_conversion_is_exact(amount in proptest::num::i64::ANY) {
            let t = table();
            let c = convert(&t, amount, Currency::Cad, Currency::Cad, june(1)).unwrap();
            prop_assert_eq!(c.amount, amount);
            prop_assert_eq!(c.rate, 1.0);
        }
    }
}
