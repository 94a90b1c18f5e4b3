//! Borrowing persistence.
//!
//! Only the payment progress (`paid`) is stored; the status is recomputed from
//! the domain state machine on every read, so an elapsed due date flips a
//! borrowing to overdue without any background job touching the row.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlTx};
use tracing::instrument;
use uuid::Uuid;

use finbook_core::{BorrowingId, Currency, DomainError, UserId};
use finbook_fx::{RateProvider, to_reference};
use finbook_ledger::{Borrowing, BorrowingStatus, Direction, validate_amount};

use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, FromRow)]
struct BorrowingRow {
    borrowing_id: Uuid,
    owner_id: Uuid,
    direction: String,
    counterparty: String,
    principal: i64,
    currency: String,
    reference_rate: f64,
    reference_amount: i64,
    paid: i64,
    due_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const BORROWING_COLUMNS: &str = "borrowing_id, owner_id, direction, counterparty, principal, \
     currency, reference_rate, reference_amount, paid, due_at, created_at, updated_at";

impl BorrowingRow {
    fn into_borrowing(self) -> Result<Borrowing, StoreError> {
        Ok(Borrowing {
            id: BorrowingId::from_uuid(self.borrowing_id),
            owner: UserId::from_uuid(self.owner_id),
            direction: Direction::from_str(&self.direction)?,
            counterparty: self.counterparty,
            principal: self.principal,
            currency: Currency::from_str(&self.currency)?,
            reference_rate: self.reference_rate,
            reference_amount: self.reference_amount,
            paid: self.paid,
            due_at: self.due_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewBorrowing {
    pub direction: Direction,
    pub counterparty: String,
    /// Principal in minor units of `currency`.
    pub principal: i64,
    pub currency: Currency,
    pub due_at: DateTime<Utc>,
}

/// Editable descriptive fields. Payment progress only changes through
/// [`BorrowingRepo::record_payment`].
#[derive(Debug, Clone)]
pub struct BorrowingUpdate {
    pub counterparty: String,
    pub principal: i64,
    pub due_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct BorrowingRepo {
    pool: PgPool,
    rates: Arc<dyn RateProvider>,
}

async fn fetch_for_update(
    tx: &mut SqlTx<'_, Postgres>,
    owner: UserId,
    id: BorrowingId,
) -> Result<Borrowing, StoreError> {
    let row = sqlx::query_as::<_, BorrowingRow>(&format!(
        "SELECT {BORROWING_COLUMNS} FROM borrowings \
         WHERE owner_id = $1 AND borrowing_id = $2 FOR UPDATE"
    ))
    .bind(owner.as_uuid())
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("borrowings.lock", e))?
    .ok_or(StoreError::NotFound)?;

    row.into_borrowing()
}

impl BorrowingRepo {
    pub fn new(pool: PgPool, rates: Arc<dyn RateProvider>) -> Self {
        Self { pool, rates }
    }

    #[instrument(skip(self, new), fields(owner = %owner, counterparty = %new.counterparty), err)]
    pub async fn create(
        &self,
        owner: UserId,
        new: NewBorrowing,
        now: DateTime<Utc>,
    ) -> Result<Borrowing, StoreError> {
        validate_amount(new.principal)?;
        if new.counterparty.trim().is_empty() {
            return Err(DomainError::validation("counterparty must not be empty").into());
        }

        // The reference equivalent is frozen at creation, like a transaction's.
        let reference = to_reference(self.rates.as_ref(), new.principal, new.currency, now)?;

        let id = BorrowingId::new();
        let row = sqlx::query_as::<_, BorrowingRow>(&format!(
            r#"
            INSERT INTO borrowings (
                borrowing_id, owner_id, direction, counterparty, principal, currency,
                reference_rate, reference_amount, due_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BORROWING_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .bind(new.direction.as_str())
        .bind(new.counterparty.trim())
        .bind(new.principal)
        .bind(new.currency.as_str())
        .bind(reference.to_reference)
        .bind(reference.amount)
        .bind(new.due_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("borrowings.create", e))?;

        row.into_borrowing()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn get(&self, owner: UserId, id: BorrowingId) -> Result<Borrowing, StoreError> {
        let row = sqlx::query_as::<_, BorrowingRow>(&format!(
            "SELECT {BORROWING_COLUMNS} FROM borrowings \
             WHERE owner_id = $1 AND borrowing_id = $2"
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("borrowings.get", e))?
        .ok_or(StoreError::NotFound)?;

        row.into_borrowing()
    }

    /// List borrowings, optionally narrowed to one recomputed status.
    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn list(
        &self,
        owner: UserId,
        status: Option<BorrowingStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Borrowing>, StoreError> {
        let rows = sqlx::query_as::<_, BorrowingRow>(&format!(
            "SELECT {BORROWING_COLUMNS} FROM borrowings WHERE owner_id = $1 ORDER BY due_at"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("borrowings.list", e))?;

        let mut borrowings = rows
            .into_iter()
            .map(BorrowingRow::into_borrowing)
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(wanted) = status {
            borrowings.retain(|b| b.status(now) == wanted);
        }
        Ok(borrowings)
    }

    #[instrument(skip(self, update), fields(owner = %owner), err)]
    pub async fn update(
        &self,
        owner: UserId,
        id: BorrowingId,
        update: BorrowingUpdate,
    ) -> Result<Borrowing, StoreError> {
        validate_amount(update.principal)?;
        if update.counterparty.trim().is_empty() {
            return Err(DomainError::validation("counterparty must not be empty").into());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("borrowings.update.begin", e))?;

        let existing = fetch_for_update(&mut tx, owner, id).await?;
        if update.principal < existing.paid {
            return Err(DomainError::validation(
                "principal cannot be reduced below the amount already paid",
            )
            .into());
        }

        // Rescale the reference equivalent to the new principal at the rate
        // captured at creation, never a live rate.
        let reference_amount = ((update.principal as f64) * existing.reference_rate).round() as i64;

        let row = sqlx::query_as::<_, BorrowingRow>(&format!(
            r#"
            UPDATE borrowings SET counterparty = $3, principal = $4, due_at = $5,
                reference_amount = $6, updated_at = NOW()
            WHERE owner_id = $1 AND borrowing_id = $2
            RETURNING {BORROWING_COLUMNS}
            "#
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(update.counterparty.trim())
        .bind(update.principal)
        .bind(update.due_at)
        .bind(reference_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("borrowings.update.row", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("borrowings.update.commit", e))?;

        row.into_borrowing()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn delete(&self, owner: UserId, id: BorrowingId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM borrowings WHERE owner_id = $1 AND borrowing_id = $2")
            .bind(owner.as_uuid())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("borrowings.delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record a payment increment under a row lock, so concurrent payments
    /// serialize and the paid-never-exceeds-principal invariant holds.
    #[instrument(skip(self), fields(owner = %owner, amount), err)]
    pub async fn record_payment(
        &self,
        owner: UserId,
        id: BorrowingId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Borrowing, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("borrowings.payment.begin", e))?;

        let mut borrowing = fetch_for_update(&mut tx, owner, id).await?;
        borrowing
            .record_payment(amount, now)
            .map_err(StoreError::from)?;

        sqlx::query("UPDATE borrowings SET paid = $2, updated_at = $3 WHERE borrowing_id = $1")
            .bind(id.as_uuid())
            .bind(borrowing.paid)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("borrowings.payment.row", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("borrowings.payment.commit", e))?;

        Ok(borrowing)
    }
}
