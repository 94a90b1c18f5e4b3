//! Integer minor-unit money handling.
//!
//! Monetary values are stored and computed as `i64` counts of minor units
//! (cents). Floating-point major-unit values never exist at rest; the only place
//! decimal notation appears is the API boundary, which goes through
//! [`minor_from_major_str`] and is rejected on excess precision.

use crate::error::{DomainError, DomainResult};

/// Upper bound on any single monetary amount: one billion major units, in minor
/// units. Amounts at or above this are assumed to be input mistakes.
pub const SANITY_CEILING_MINOR: i64 = 1_000_000_000 * 100;

/// Parse a decimal major-unit string ("75.25", "-3", "0.10") into minor units.
///
/// Rejects:
/// - empty / non-numeric input,
/// - more than two decimal places (excess precision),
/// - magnitudes at or above [`SANITY_CEILING_MINOR`].
pub fn minor_from_major_str(s: &str) -> DomainResult<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    if digits.is_empty() {
        return Err(DomainError::validation("amount must not be empty"));
    }

    let (major_part, frac_part) = match digits.split_once('.') {
        Some((maj, frac)) => (maj, frac),
        None => (digits, ""),
    };

    if major_part.is_empty() && frac_part.is_empty() {
        return Err(DomainError::validation("amount must contain digits"));
    }
    if !major_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(DomainError::validation(format!(
            "amount '{s}' is not a decimal number"
        )));
    }
    if frac_part.len() > 2 {
        return Err(DomainError::validation(format!(
            "amount '{s}' has more than two decimal places"
        )));
    }

    let major: i64 = if major_part.is_empty() {
        0
    } else {
        major_part
            .parse()
            .map_err(|_| DomainError::validation(format!("amount '{s}' is out of range")))?
    };

    // "5.5" means 5 major + 50 minor, not 5 minor.
    let mut frac: i64 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().unwrap_or(0)
    };
    if frac_part.len() == 1 {
        frac *= 10;
    }

    let minor = major
        .checked_mul(100)
        .and_then(|m| m.checked_add(frac))
        .ok_or_else(|| DomainError::validation(format!("amount '{s}' is out of range")))?;

    if minor >= SANITY_CEILING_MINOR {
        return Err(DomainError::validation(format!(
            "amount '{s}' exceeds the supported maximum"
        )));
    }

    Ok(if negative { -minor } else { minor })
}

/// Format minor units as a decimal major-unit string ("92475" → "924.75").
pub fn major_string(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(minor_from_major_str("75.25").unwrap(), 7525);
        assert_eq!(minor_from_major_str("1000").unwrap(), 100_000);
        assert_eq!(minor_from_major_str("0.05").unwrap(), 5);
        assert_eq!(minor_from_major_str("5.5").unwrap(), 550);
        assert_eq!(minor_from_major_str("-3").unwrap(), -300);
        assert_eq!(minor_from_major_str(".75").unwrap(), 75);
    }

    #[test]
    fn rejects_excess_precision() {
        assert!(minor_from_major_str("1.234").is_err());
        assert!(minor_from_major_str("0.001").is_err());
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(minor_from_major_str("").is_err());
        assert!(minor_from_major_str("abc").is_err());
        assert!(minor_from_major_str("1.2.3").is_err());
        assert!(minor_from_major_str("1e5").is_err());
        assert!(minor_from_major_str(".").is_err());
    }

    #[test]
    fn rejects_amounts_above_the_ceiling() {
        assert!(minor_from_major_str("1000000000").is_err());
        assert!(minor_from_major_str("999999999.99").is_ok());
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(major_string(92_475), "924.75");
        assert_eq!(major_string(-50), "-0.50");
        assert_eq!(major_string(0), "0.00");
    }

    proptest! {
        #[test]
        fn format_then_parse_round_trips(minor in -(SANITY_CEILING_MINOR - 1)..SANITY_CEILING_MINOR) {
            let formatted = major_string(minor);
            prop_assert_eq!(minor_from_major_str(&formatted).unwrap(), minor);
        }
    }
}
