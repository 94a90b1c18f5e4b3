//! Peer borrowings and the payment status state machine.
//!
//! States: `pending → partially_paid → paid`, `pending → overdue`, and
//! `overdue → partially_paid/paid` via further payment. `paid` is terminal.
//! Status is never stored: it is always recomputed from
//! (paid, principal, due date, now).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finbook_core::{BorrowingId, Currency, DomainError, UserId};

use crate::error::LedgerError;
use crate::transaction::validate_amount;

/// Direction of the borrowing from the owner's point of view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Owner owes the counterparty.
    Borrowed,
    /// Counterparty owes the owner.
    Lent,
}

impl core::str::FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "borrowed" => Ok(Direction::Borrowed),
            "lent" => Ok(Direction::Lent),
            other => Err(DomainError::validation(format!(
                "unknown borrowing direction '{other}'"
            ))),
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Borrowed => "borrowed",
            Direction::Lent => "lent",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowingStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
}

/// The status function. Pure: identical inputs always produce the same status,
/// however many times it is recomputed.
pub fn status_of(
    paid: i64,
    principal: i64,
    due_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> BorrowingStatus {
    if paid >= principal {
        BorrowingStatus::Paid
    } else if paid > 0 {
        BorrowingStatus::PartiallyPaid
    } else if due_at < now {
        BorrowingStatus::Overdue
    } else {
        BorrowingStatus::Pending
    }
}

/// A peer borrowing owned by exactly one user.
///
/// Invariant: `paid` never exceeds `principal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrowing {
    pub id: BorrowingId,
    pub owner: UserId,
    pub direction: Direction,
    pub counterparty: String,
    /// Principal in minor units of `currency`.
    pub principal: i64,
    pub currency: Currency,
    /// Currency→reference rate captured at creation.
    pub reference_rate: f64,
    /// Principal equivalent in reference-currency minor units.
    pub reference_amount: i64,
    /// Paid so far, in minor units of `currency`.
    pub paid: i64,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Borrowing {
    pub fn status(&self, now: DateTime<Utc>) -> BorrowingStatus {
        status_of(self.paid, self.principal, self.due_at, now)
    }

    pub fn remaining(&self) -> i64 {
        self.principal - self.paid
    }

    /// Record a payment increment and return the recomputed status.
    ///
    /// Rejects payments against a settled borrowing and increments that would
    /// push `paid` above `principal`; on rejection the borrowing is unchanged.
    pub fn record_payment(
        &mut self,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<BorrowingStatus, LedgerError> {
        let amount = validate_amount(amount)?;

        if self.status(now) == BorrowingStatus::Paid {
            return Err(LedgerError::BorrowingAlreadySettled);
        }

        let next = self
            .paid
            .checked_add(amount)
            .ok_or(LedgerError::AmountOverflow)?;
        if next > self.principal {
            return Err(LedgerError::PaymentExceedsPrincipal {
                amount,
                remaining: self.remaining(),
            });
        }

        self.paid = next;
        self.updated_at = now;
        Ok(self.status(now))
    }
}
