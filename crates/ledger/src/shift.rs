//! Work-shift entries and earnings arithmetic.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use finbook_core::{ShiftId, TransactionId, UserId};

/// A single work shift.
///
/// Earnings are derived, never stored: hours from the start/end pair (with
/// overnight wraparound), base pay from hours × hourly rate, total from
/// base + tips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkShift {
    pub id: ShiftId,
    pub owner: UserId,
    pub date: NaiveDate,
    pub position: String,
    /// Hourly rate in minor units per hour.
    pub hourly_rate: i64,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Tips in minor units.
    pub tips: i64,
    /// Set when the shift spawned a linked income transaction.
    pub income_transaction: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkShift {
    /// Minutes worked. `end <= start` wraps across midnight, so a 22:00–06:00
    /// shift is 480 minutes and `end == start` is a zero-length shift.
    pub fn minutes_worked(&self) -> i64 {
        let start = self.start.num_seconds_from_midnight() as i64 / 60;
        let end = self.end.num_seconds_from_midnight() as i64 / 60;
        (end - start).rem_euclid(24 * 60)
    }

    pub fn hours_worked(&self) -> f64 {
        self.minutes_worked() as f64 / 60.0
    }

    /// Base earnings in minor units, rounded half-up to the nearest unit.
    pub fn base_earnings(&self) -> i64 {
        (self.minutes_worked() * self.hourly_rate + 30) / 60
    }

    pub fn total_earnings(&self) -> i64 {
        self.base_earnings() + self.tips
    }
}
