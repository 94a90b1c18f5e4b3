//! Work-shift persistence.
//!
//! A shift may spawn a linked income transaction for its earnings. The link is
//! kept consistent under the same rules as any other ledger write: editing a
//! linked shift reverses the old income effect and applies the recomputed one,
//! and deleting the shift removes the transaction, all in one SQL transaction.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlTx};
use tracing::instrument;
use uuid::Uuid;

use finbook_core::{AccountId, DomainError, ShiftId, TransactionId, UserId};
use finbook_fx::{RateProvider, to_reference};
use finbook_ledger::{TransactionKind, WorkShift};

use crate::accounts::{fetch_account_for_update, update_balance};
use crate::error::{StoreError, map_sqlx_error};
use crate::transactions::{NewTransaction, TRANSACTION_COLUMNS, TransactionRow, post_transaction};

#[derive(Debug, FromRow)]
struct ShiftRow {
    shift_id: Uuid,
    owner_id: Uuid,
    shift_date: NaiveDate,
    position: String,
    hourly_rate: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
    tips: i64,
    income_transaction_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const SHIFT_COLUMNS: &str = "shift_id, owner_id, shift_date, position, hourly_rate, \
     start_time, end_time, tips, income_transaction_id, created_at, updated_at";

impl ShiftRow {
    fn into_shift(self) -> WorkShift {
        WorkShift {
            id: ShiftId::from_uuid(self.shift_id),
            owner: UserId::from_uuid(self.owner_id),
            date: self.shift_date,
            position: self.position,
            hourly_rate: self.hourly_rate,
            start: self.start_time,
            end: self.end_time,
            tips: self.tips,
            income_transaction: self.income_transaction_id.map(TransactionId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewShift {
    pub date: NaiveDate,
    pub position: String,
    /// Hourly rate in minor units per hour.
    pub hourly_rate: i64,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Tips in minor units.
    pub tips: i64,
    /// When set, the shift's total earnings are posted as an income
    /// transaction on this account, atomically with the shift insert.
    pub income_account: Option<AccountId>,
}

#[derive(Debug, Clone)]
pub struct ShiftUpdate {
    pub date: NaiveDate,
    pub position: String,
    pub hourly_rate: i64,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub tips: i64,
}

#[derive(Clone)]
pub struct ShiftRepo {
    pool: PgPool,
    rates: Arc<dyn RateProvider>,
}

fn validate_fields(position: &str, hourly_rate: i64, tips: i64) -> Result<(), StoreError> {
    if position.trim().is_empty() {
        return Err(DomainError::validation("position must not be empty").into());
    }
    if hourly_rate < 0 {
        return Err(DomainError::validation("hourly rate must not be negative").into());
    }
    if tips < 0 {
        return Err(DomainError::validation("tips must not be negative").into());
    }
    Ok(())
}

/// When the income for a shift lands on the ledger. Overnight shifts end on
/// the following calendar day.
fn shift_ends_at(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> DateTime<Utc> {
    let end_date = if end <= start {
        date.succ_opt().unwrap_or(date)
    } else {
        date
    };
    end_date.and_time(end).and_utc()
}

impl ShiftRepo {
    pub fn new(pool: PgPool, rates: Arc<dyn RateProvider>) -> Self {
        Self { pool, rates }
    }

    #[instrument(skip(self, new), fields(owner = %owner, date = %new.date), err)]
    pub async fn create(&self, owner: UserId, new: NewShift) -> Result<WorkShift, StoreError> {
        validate_fields(&new.position, new.hourly_rate, new.tips)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("shifts.create.begin", e))?;

        let id = ShiftId::new();
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            r#"
            INSERT INTO work_shifts (
                shift_id, owner_id, shift_date, position, hourly_rate,
                start_time, end_time, tips
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SHIFT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .bind(new.date)
        .bind(new.position.trim())
        .bind(new.hourly_rate)
        .bind(new.start)
        .bind(new.end)
        .bind(new.tips)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("shifts.create", e))?;

        let mut shift = row.into_shift();

        if let Some(account_id) = new.income_account {
            let earnings = shift.total_earnings();
            if earnings <= 0 {
                return Err(DomainError::validation(
                    "shift has no earnings to record as income",
                )
                .into());
            }

            // Earnings are denominated in the target account's currency.
            let account = fetch_account_for_update(&mut tx, owner, account_id).await?;
            let income = post_transaction(
                &mut tx,
                self.rates.as_ref(),
                owner,
                &NewTransaction {
                    account_id,
                    kind: TransactionKind::Income,
                    category: "work".to_string(),
                    amount: earnings,
                    currency: account.currency,
                    description: Some(format!("{} shift on {}", shift.position, shift.date)),
                    effective_at: shift_ends_at(shift.date, shift.start, shift.end),
                },
            )
            .await?;

            sqlx::query(
                "UPDATE work_shifts SET income_transaction_id = $2 WHERE shift_id = $1",
            )
            .bind(shift.id.as_uuid())
            .bind(income.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("shifts.create.link", e))?;

            shift.income_transaction = Some(income.id);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("shifts.create.commit", e))?;

        Ok(shift)
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn get(&self, owner: UserId, id: ShiftId) -> Result<WorkShift, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM work_shifts WHERE owner_id = $1 AND shift_id = $2"
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("shifts.get", e))?
        .ok_or(StoreError::NotFound)?;

        Ok(row.into_shift())
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn list(
        &self,
        owner: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<WorkShift>, StoreError> {
        let rows = sqlx::query_as::<_, ShiftRow>(&format!(
            r#"
            SELECT {SHIFT_COLUMNS} FROM work_shifts
            WHERE owner_id = $1
              AND ($2::date IS NULL OR shift_date >= $2)
              AND ($3::date IS NULL OR shift_date <= $3)
            ORDER BY shift_date DESC, start_time DESC
            "#
        ))
        .bind(owner.as_uuid())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("shifts.list", e))?;

        Ok(rows.into_iter().map(ShiftRow::into_shift).collect())
    }

    /// Update a shift. When the shift has a linked income transaction, the
    /// transaction is re-posted at the recomputed earnings in the same SQL
    /// transaction: old effect reversed, new one applied.
    #[instrument(skip(self, update), fields(owner = %owner), err)]
    pub async fn update(
        &self,
        owner: UserId,
        id: ShiftId,
        update: ShiftUpdate,
    ) -> Result<WorkShift, StoreError> {
        validate_fields(&update.position, update.hourly_rate, update.tips)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("shifts.update.begin", e))?;

        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            r#"
            UPDATE work_shifts SET shift_date = $3, position = $4, hourly_rate = $5,
                start_time = $6, end_time = $7, tips = $8, updated_at = NOW()
            WHERE owner_id = $1 AND shift_id = $2
            RETURNING {SHIFT_COLUMNS}
            "#
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(update.date)
        .bind(update.position.trim())
        .bind(update.hourly_rate)
        .bind(update.start)
        .bind(update.end)
        .bind(update.tips)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("shifts.update.row", e))?
        .ok_or(StoreError::NotFound)?;

        let shift = row.into_shift();

        if let Some(txn_id) = shift.income_transaction {
            let earnings = shift.total_earnings();
            if earnings <= 0 {
                return Err(DomainError::validation(
                    "shift with recorded income must keep positive earnings",
                )
                .into());
            }
            self.repost_income(&mut tx, owner, &shift, txn_id, earnings)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("shifts.update.commit", e))?;

        Ok(shift)
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn delete(&self, owner: UserId, id: ShiftId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("shifts.delete.begin", e))?;

        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM work_shifts \
             WHERE owner_id = $1 AND shift_id = $2 FOR UPDATE"
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("shifts.delete.lock", e))?
        .ok_or(StoreError::NotFound)?;

        let shift = row.into_shift();

        if let Some(txn_id) = shift.income_transaction {
            let income = lock_income_transaction(&mut tx, owner, txn_id).await?;
            let account = fetch_account_for_update(&mut tx, owner, income.account_id).await?;
            let reversed = account
                .balance
                .checked_add(income.reversal_effect())
                .ok_or(finbook_ledger::LedgerError::AmountOverflow)?;
            update_balance(&mut tx, account.id, reversed).await?;
            // The shift row goes first so its FK does not block the delete.
            sqlx::query("DELETE FROM work_shifts WHERE shift_id = $1")
                .bind(shift.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("shifts.delete.row", e))?;
            sqlx::query("DELETE FROM transactions WHERE transaction_id = $1")
                .bind(income.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("shifts.delete.income", e))?;
        } else {
            sqlx::query("DELETE FROM work_shifts WHERE shift_id = $1")
                .bind(shift.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("shifts.delete.row", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("shifts.delete.commit", e))?;
        Ok(())
    }

    async fn repost_income(
        &self,
        tx: &mut SqlTx<'_, Postgres>,
        owner: UserId,
        shift: &WorkShift,
        txn_id: TransactionId,
        earnings: i64,
    ) -> Result<(), StoreError> {
        let income = lock_income_transaction(tx, owner, txn_id).await?;
        let account = fetch_account_for_update(tx, owner, income.account_id).await?;

        // Net of reversing the old income and applying the new one.
        let net = income.reversal_effect() + earnings;
        let new_balance = account.balance_after(net).map_err(StoreError::from)?;

        let effective_at = shift_ends_at(shift.date, shift.start, shift.end);
        let reference = to_reference(self.rates.as_ref(), earnings, account.currency, effective_at)?;

        sqlx::query(
            r#"
            UPDATE transactions SET amount = $2, account_amount = $2, reference_rate = $3,
                reference_amount = $4, description = $5, effective_at = $6, updated_at = NOW()
            WHERE transaction_id = $1
            "#,
        )
        .bind(income.id.as_uuid())
        .bind(earnings)
        .bind(reference.to_reference)
        .bind(reference.amount)
        .bind(format!("{} shift on {}", shift.position, shift.date))
        .bind(effective_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("shifts.update.income", e))?;

        update_balance(tx, account.id, new_balance).await?;
        Ok(())
    }
}

async fn lock_income_transaction(
    tx: &mut SqlTx<'_, Postgres>,
    owner: UserId,
    id: TransactionId,
) -> Result<finbook_ledger::Transaction, StoreError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions \
         WHERE owner_id = $1 AND transaction_id = $2 FOR UPDATE"
    ))
    .bind(owner.as_uuid())
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("shifts.income.lock", e))?
    .ok_or(StoreError::NotFound)?;

    row.into_transaction()
}
