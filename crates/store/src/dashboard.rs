//! Dashboard aggregation.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use finbook_core::{Currency, UserId};
use finbook_fx::{RateProvider, to_reference};
use finbook_ledger::Direction;

use crate::error::{StoreError, map_sqlx_error};

/// Active-account balance total for one currency.
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyTotal {
    pub currency: Currency,
    /// Sum of balances in minor units of `currency`.
    pub balance: i64,
    /// The same total in reference-currency minor units at current rates.
    pub reference_balance: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// First day of the summarized month.
    pub month: NaiveDate,
    pub account_totals: Vec<CurrencyTotal>,
    /// Net worth across active accounts, reference-currency minor units.
    pub net_worth: i64,
    /// Income posted in the month, reference-currency minor units.
    pub month_income: i64,
    /// Expenses posted in the month, reference-currency minor units.
    pub month_expense: i64,
    /// Outstanding amounts the owner still owes, reference-currency minor units.
    pub owed_by_me: i64,
    /// Outstanding amounts owed to the owner, reference-currency minor units.
    pub owed_to_me: i64,
}

#[derive(Debug, FromRow)]
struct BalanceTotalRow {
    currency: String,
    total: i64,
}

#[derive(Debug, FromRow)]
struct KindTotalRow {
    kind: String,
    total: i64,
}

#[derive(Debug, FromRow)]
struct BorrowingTotalRow {
    direction: String,
    currency: String,
    remaining: i64,
}

#[derive(Clone)]
pub struct DashboardRepo {
    pool: PgPool,
    rates: Arc<dyn RateProvider>,
}

impl DashboardRepo {
    pub fn new(pool: PgPool, rates: Arc<dyn RateProvider>) -> Self {
        Self { pool, rates }
    }

    /// Summarize the owner's finances for the month containing `month` (any
    /// day in the month works), at `now`'s exchange rates.
    #[instrument(skip(self), fields(owner = %owner, month = %month), err)]
    pub async fn summary(
        &self,
        owner: UserId,
        month: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, StoreError> {
        let month_start = month
            .with_day(1)
            .unwrap_or(month);
        let month_end = month_start
            .checked_add_months(Months::new(1))
            .unwrap_or(month_start);
        let range_start = month_start.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let range_end = month_end.and_hms_opt(0, 0, 0).map(|t| t.and_utc());

        let balance_rows = sqlx::query_as::<_, BalanceTotalRow>(
            r#"
            SELECT currency, SUM(balance)::BIGINT AS total
            FROM accounts
            WHERE owner_id = $1 AND active
            GROUP BY currency
            ORDER BY currency
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard.balances", e))?;

        let mut account_totals = Vec::with_capacity(balance_rows.len());
        let mut net_worth: i64 = 0;
        for row in balance_rows {
            let currency = Currency::from_str(&row.currency)?;
            let reference = to_reference(self.rates.as_ref(), row.total, currency, now)?;
            net_worth += reference.amount;
            account_totals.push(CurrencyTotal {
                currency,
                balance: row.total,
                reference_balance: reference.amount,
            });
        }

        let kind_rows = sqlx::query_as::<_, KindTotalRow>(
            r#"
            SELECT kind, SUM(reference_amount)::BIGINT AS total
            FROM transactions
            WHERE owner_id = $1
              AND kind IN ('income', 'expense')
              AND ($2::timestamptz IS NULL OR effective_at >= $2)
              AND ($3::timestamptz IS NULL OR effective_at < $3)
            GROUP BY kind
            "#,
        )
        .bind(owner.as_uuid())
        .bind(range_start)
        .bind(range_end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard.kinds", e))?;

        let mut month_income = 0;
        let mut month_expense = 0;
        for row in kind_rows {
            match row.kind.as_str() {
                "income" => month_income = row.total,
                "expense" => month_expense = row.total,
                _ => {}
            }
        }

        let borrowing_rows = sqlx::query_as::<_, BorrowingTotalRow>(
            r#"
            SELECT direction, currency, SUM(principal - paid)::BIGINT AS remaining
            FROM borrowings
            WHERE owner_id = $1 AND paid < principal
            GROUP BY direction, currency
            "#,
        )
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("dashboard.borrowings", e))?;

        let mut owed_by_me = 0;
        let mut owed_to_me = 0;
        for row in borrowing_rows {
            let currency = Currency::from_str(&row.currency)?;
            let reference = to_reference(self.rates.as_ref(), row.remaining, currency, now)?;
            match Direction::from_str(&row.direction)? {
                Direction::Borrowed => owed_by_me += reference.amount,
                Direction::Lent => owed_to_me += reference.amount,
            }
        }

        Ok(DashboardSummary {
            month: month_start,
            account_totals,
            net_worth,
            month_income,
            month_expense,
            owed_by_me,
            owed_to_me,
        })
    }
}
