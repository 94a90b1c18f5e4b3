//! Transactions and their signed balance effects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use finbook_core::{AccountId, Currency, DomainError, SANITY_CEILING_MINOR, TransactionId, UserId};

/// Transaction kind. Transfers are modeled as two linked postings — one
/// `TransferOut` on the source account and one `TransferIn` on the destination —
/// sharing a transfer group id, never as a single signed row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    TransferIn,
    TransferOut,
    /// Synthesized by explicit balance edits; behaves like income/expense
    /// depending on the sign of the stored amount's effect.
    Adjustment,
}

impl TransactionKind {
    /// Sign of the balance effect on the owning account.
    pub fn sign(&self) -> i64 {
        match self {
            TransactionKind::Income | TransactionKind::TransferIn => 1,
            TransactionKind::Expense | TransactionKind::TransferOut => -1,
            // Adjustments carry their sign in the amount itself.
            TransactionKind::Adjustment => 1,
        }
    }

    pub fn is_transfer_leg(&self) -> bool {
        matches!(self, TransactionKind::TransferIn | TransactionKind::TransferOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::Adjustment => "adjustment",
        }
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            "adjustment" => Ok(TransactionKind::Adjustment),
            other => Err(DomainError::validation(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

/// A ledger transaction.
///
/// `amount`/`currency` are what the user entered; `account_amount` is the same
/// value converted into the owning account's currency at creation time, and is
/// the exact quantity the balance moved by (reversal uses it, never a re-derived
/// live rate). `reference_amount` is the equivalent in reference-currency minor
/// units at the captured `reference_rate`, frozen for historical auditability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner: UserId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub category: String,
    /// Entered amount in minor units of `currency`. Positive except for
    /// adjustments, which carry their own sign.
    pub amount: i64,
    pub currency: Currency,
    /// Amount in the account's currency; what the balance actually moved by
    /// (together with the kind's sign).
    pub account_amount: i64,
    /// Source→reference rate captured at the effective date.
    pub reference_rate: f64,
    /// Equivalent in reference-currency minor units at `reference_rate`.
    pub reference_amount: i64,
    pub description: Option<String>,
    pub effective_at: DateTime<Utc>,
    /// Links the two legs of a transfer.
    pub transfer_group: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed effect this transaction has on its account's balance.
    pub fn balance_effect(&self) -> i64 {
        self.kind.sign() * self.account_amount
    }

    /// Inverse of [`balance_effect`](Self::balance_effect); applied before an
    /// update re-applies the new values, and on delete.
    pub fn reversal_effect(&self) -> i64 {
        -self.balance_effect()
    }
}

/// Validate a user-entered transaction amount: strictly positive and below the
/// sanity ceiling. Amount sign always comes from the kind, never the input.
pub fn validate_amount(amount: i64) -> Result<i64, DomainError> {
    if amount <= 0 {
        return Err(DomainError::validation("amount must be positive"));
    }
    if amount >= SANITY_CEILING_MINOR {
        return Err(DomainError::validation(
            "amount exceeds the supported maximum",
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn txn(kind: TransactionKind, account_amount: i64) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: TransactionId::new(),
            owner: UserId::new(),
            account_id: AccountId::new(),
            kind,
            category: "general".to_string(),
            amount: account_amount.abs(),
            currency: Currency::Usd,
            account_amount,
            reference_rate: 1.0,
            reference_amount: account_amount,
            description: None,
            effective_at: now,
            transfer_group: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn income_adds_and_expense_subtracts() {
        assert_eq!(txn(TransactionKind::Income, 500).balance_effect(), 500);
        assert_eq!(txn(TransactionKind::Expense, 500).balance_effect(), -500);
        assert_eq!(txn(TransactionKind::TransferIn, 500).balance_effect(), 500);
        assert_eq!(txn(TransactionKind::TransferOut, 500).balance_effect(), -500);
    }

    #[test]
    fn reversal_is_the_exact_inverse() {
        let t = txn(TransactionKind::Expense, 7_525);
        assert_eq!(t.balance_effect() + t.reversal_effect(), 0);
    }

    #[test]
    fn amount_validation_bounds() {
        assert!(validate_amount(1).is_ok());
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-10).is_err());
        assert!(validate_amount(SANITY_CEILING_MINOR).is_err());
        assert!(validate_amount(SANITY_CEILING_MINOR - 1).is_ok());
    }

    /// Replays a sequence of creates, updates, and deletes the way the store
    /// does (reverse old effect, apply new one) and checks the drift-freedom
    /// invariant: balance always equals initial + sum of extant effects.
    #[derive(Debug, Clone)]
    enum Op {
        Create(TransactionKind, i64),
        Update(usize, i64),
        Delete(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (any::<bool>(), 1i64..100_000).prop_map(|(income, amt)| Op::Create(
                if income {
                    TransactionKind::Income
                } else {
                    TransactionKind::Expense
                },
                amt
            )),
            (0usize..16, 1i64..100_000).prop_map(|(i, amt)| Op::Update(i, amt)),
            (0usize..16).prop_map(Op::Delete),
        ]
    }

    proptest! {
        #[test]
        fn balance_never_drifts_from_extant_effects(
            initial in 0i64..10_000_000,
            ops in prop::collection::vec(op_strategy(), 1..40),
        ) {
            let mut balance = initial;
            let mut extant: Vec<Transaction> = Vec::new();

            for op in ops {
                match op {
                    Op::Create(kind, amt) => {
                        let t = txn(kind, amt);
                        balance += t.balance_effect();
                        extant.push(t);
                    }
                    Op::Update(i, amt) if !extant.is_empty() => {
                        let i = i % extant.len();
                        balance += extant[i].reversal_effect();
                        extant[i].account_amount = amt;
                        extant[i].amount = amt;
                        balance += extant[i].balance_effect();
                    }
                    Op::Delete(i) if !extant.is_empty() => {
                        let i = i % extant.len();
                        let t = extant.remove(i);
                        balance += t.reversal_effect();
                    }
                    _ => {}
                }

                let expected: i64 =
                    initial + extant.iter().map(Transaction::balance_effect).sum::<i64>();
                prop_assert_eq!(balance, expected);
            }
        }
    }
}
