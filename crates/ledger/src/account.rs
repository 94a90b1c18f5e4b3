//! Accounts and balance rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finbook_core::{AccountId, Currency, UserId};

use crate::error::LedgerError;

/// Account category. Determines whether a negative balance is allowed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Investment,
    Cash,
}

impl AccountKind {
    /// Only credit accounts may carry a negative balance.
    pub fn allows_negative(&self) -> bool {
        matches!(self, AccountKind::Credit)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Checking => "checking",
            AccountKind::Savings => "savings",
            AccountKind::Credit => "credit",
            AccountKind::Investment => "investment",
            AccountKind::Cash => "cash",
        }
    }
}

impl core::str::FromStr for AccountKind {
    type Err = finbook_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "checking" => Ok(AccountKind::Checking),
            "savings" => Ok(AccountKind::Savings),
            "credit" => Ok(AccountKind::Credit),
            "investment" => Ok(AccountKind::Investment),
            "cash" => Ok(AccountKind::Cash),
            other => Err(finbook_core::DomainError::validation(format!(
                "unknown account kind '{other}'"
            ))),
        }
    }
}

/// A bank account owned by exactly one user.
///
/// Invariant: `balance` is an integer count of minor units and always equals the
/// initial balance plus the net effect of all extant transactions; it is mutated
/// only through transaction create/update/delete or an explicit adjustment that
/// synthesizes an offsetting transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub name: String,
    pub kind: AccountKind,
    /// Balance in minor units of `currency`.
    pub balance: i64,
    pub currency: Currency,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.active {
            Ok(())
        } else {
            Err(LedgerError::InactiveAccount)
        }
    }

    /// Balance after applying a signed delta, enforcing the negative-balance rule.
    ///
    /// Does not mutate the account; persistence applies the returned value
    /// inside the same database transaction as the transaction record.
    pub fn balance_after(&self, delta: i64) -> Result<i64, LedgerError> {
        let next = self
            .balance
            .checked_add(delta)
            .ok_or(LedgerError::AmountOverflow)?;
        if next < 0 && !self.kind.allows_negative() {
            return Err(LedgerError::InsufficientFunds {
                balance: self.balance,
                delta,
            });
        }
        Ok(next)
    }
}
