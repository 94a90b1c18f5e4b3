//! Supported currency set.
//!
//! The tracker supports a closed, hand-maintained set of currencies. All of them
//! use two decimal places, so one major unit is always 100 minor units.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// ISO 4217 currency code from the supported set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Chf,
    Inr,
}

impl Currency {
    /// The reference currency all captured exchange rates are quoted against.
    pub const REFERENCE: Currency = Currency::Usd;

    /// Minor units per major unit (cents per dollar, etc.).
    pub const MINOR_PER_MAJOR: i64 = 100;

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Chf => "CHF",
            Currency::Inr => "INR",
        }
    }

    pub fn all() -> &'static [Currency] {
        &[
            Currency::Usd,
            Currency::Eur,
            Currency::Gbp,
            Currency::Cad,
            Currency::Aud,
            Currency::Chf,
            Currency::Inr,
        ]
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            "CHF" => Ok(Currency::Chf),
            "INR" => Ok(Currency::Inr),
            other => Err(DomainError::validation(format!(
                "unsupported currency code '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for c in Currency::all() {
            assert_eq!(Currency::from_str(c.as_str()).unwrap(), *c);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Currency::from_str("usd").unwrap(), Currency::Usd);
        assert_eq!(Currency::from_str("Eur").unwrap(), Currency::Eur);
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(Currency::from_str("BTC").is_err());
        assert!(Currency::from_str("").is_err());
    }
}
