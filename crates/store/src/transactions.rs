//! Transaction persistence and the balance-mutation contract.
//!
//! Every operation here spans the transaction record and the account balance in
//! one SQL transaction: if either write fails, neither is kept. Updates reverse
//! the prior effect at the originally captured amount, then apply the new
//! values as a fresh create. Reference-currency equivalents are computed from
//! the rate nearest the transaction's effective date, never a live rate.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlTx};
use tracing::instrument;
use uuid::Uuid;

use finbook_core::{AccountId, Currency, DomainError, TransactionId, UserId};
use finbook_fx::{RateProvider, convert, to_reference};
use finbook_ledger::{Transaction, TransactionKind, validate_amount};

use crate::accounts::{fetch_account_for_update, update_balance};
use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, FromRow)]
pub(crate) struct TransactionRow {
    pub transaction_id: Uuid,
    pub owner_id: Uuid,
    pub account_id: Uuid,
    pub kind: String,
    pub category: String,
    pub amount: i64,
    pub currency: String,
    pub account_amount: i64,
    pub reference_rate: f64,
    pub reference_amount: i64,
    pub description: Option<String>,
    pub effective_at: DateTime<Utc>,
    pub transfer_group: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const TRANSACTION_COLUMNS: &str = "transaction_id, owner_id, account_id, kind, \
     category, amount, currency, account_amount, reference_rate, reference_amount, \
     description, effective_at, transfer_group, created_at, updated_at";

impl TransactionRow {
    pub(crate) fn into_transaction(self) -> Result<Transaction, StoreError> {
        Ok(Transaction {
            id: TransactionId::from_uuid(self.transaction_id),
            owner: UserId::from_uuid(self.owner_id),
            account_id: AccountId::from_uuid(self.account_id),
            kind: TransactionKind::from_str(&self.kind)?,
            category: self.category,
            amount: self.amount,
            currency: Currency::from_str(&self.currency)?,
            account_amount: self.account_amount,
            reference_rate: self.reference_rate,
            reference_amount: self.reference_amount,
            description: self.description,
            effective_at: self.effective_at,
            transfer_group: self.transfer_group,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// User-entered values for a new income/expense transaction.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub category: String,
    /// Positive amount in minor units of `currency`.
    pub amount: i64,
    pub currency: Currency,
    pub description: Option<String>,
    pub effective_at: DateTime<Utc>,
}

/// Replacement values for an existing transaction.
#[derive(Debug, Clone)]
pub struct TransactionUpdate {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: i64,
    pub currency: Currency,
    pub description: Option<String>,
    pub effective_at: DateTime<Utc>,
}

/// A transfer between two accounts of the same owner.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account: AccountId,
    pub to_account: AccountId,
    /// Positive amount in minor units of `currency`.
    pub amount: i64,
    pub currency: Currency,
    pub description: Option<String>,
    pub effective_at: DateTime<Utc>,
}

/// Optional list filters.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub account_id: Option<AccountId>,
    pub kind: Option<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct TransactionRepo {
    pool: PgPool,
    rates: Arc<dyn RateProvider>,
}

/// Insert a transaction row and move its account's balance, inside an already
/// open SQL transaction. This is the single implementation of the create-side
/// ledger contract; the shift repo reuses it for spawned income transactions.
pub(crate) async fn post_transaction(
    tx: &mut SqlTx<'_, Postgres>,
    rates: &dyn RateProvider,
    owner: UserId,
    new: &NewTransaction,
) -> Result<Transaction, StoreError> {
    if new.kind.is_transfer_leg() || new.kind == TransactionKind::Adjustment {
        return Err(DomainError::validation(
            "kind must be income or expense; use the transfer or adjustment endpoints",
        )
        .into());
    }
    validate_amount(new.amount)?;

    let account = fetch_account_for_update(tx, owner, new.account_id).await?;
    account.ensure_active().map_err(StoreError::from)?;

    let in_account = convert(
        rates,
        new.amount,
        new.currency,
        account.currency,
        new.effective_at,
    )?;
    let reference = to_reference(rates, new.amount, new.currency, new.effective_at)?;

    let delta = new.kind.sign() * in_account.amount;
    let new_balance = account.balance_after(delta).map_err(StoreError::from)?;

    let row = insert_row(
        tx,
        owner,
        new,
        in_account.amount,
        reference.to_reference,
        reference.amount,
        None,
    )
    .await?;

    update_balance(tx, account.id, new_balance).await?;

    row.into_transaction()
}

async fn insert_row(
    tx: &mut SqlTx<'_, Postgres>,
    owner: UserId,
    new: &NewTransaction,
    account_amount: i64,
    reference_rate: f64,
    reference_amount: i64,
    transfer_group: Option<Uuid>,
) -> Result<TransactionRow, StoreError> {
    let id = TransactionId::new();
    sqlx::query_as::<_, TransactionRow>(&format!(
        r#"
        INSERT INTO transactions (
            transaction_id, owner_id, account_id, kind, category, amount, currency,
            account_amount, reference_rate, reference_amount, description, effective_at,
            transfer_group
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {TRANSACTION_COLUMNS}
        "#
    ))
    .bind(id.as_uuid())
    .bind(owner.as_uuid())
    .bind(new.account_id.as_uuid())
    .bind(new.kind.as_str())
    .bind(&new.category)
    .bind(new.amount)
    .bind(new.currency.as_str())
    .bind(account_amount)
    .bind(reference_rate)
    .bind(reference_amount)
    .bind(&new.description)
    .bind(new.effective_at)
    .bind(transfer_group)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("transactions.insert", e))
}

async fn fetch_for_update(
    tx: &mut SqlTx<'_, Postgres>,
    owner: UserId,
    id: TransactionId,
) -> Result<Transaction, StoreError> {
    let row = sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions \
         WHERE owner_id = $1 AND transaction_id = $2 FOR UPDATE"
    ))
    .bind(owner.as_uuid())
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("transactions.lock", e))?
    .ok_or(StoreError::NotFound)?;

    row.into_transaction()
}

impl TransactionRepo {
    pub fn new(pool: PgPool, rates: Arc<dyn RateProvider>) -> Self {
        Self { pool, rates }
    }

    #[instrument(skip(self, new), fields(owner = %owner, account = %new.account_id), err)]
    pub async fn create(
        &self,
        owner: UserId,
        new: NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("transactions.create.begin", e))?;

        let created = post_transaction(&mut tx, self.rates.as_ref(), owner, &new).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transactions.create.commit", e))?;
        Ok(created)
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn get(&self, owner: UserId, id: TransactionId) -> Result<Transaction, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE owner_id = $1 AND transaction_id = $2"
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions.get", e))?
        .ok_or(StoreError::NotFound)?;

        row.into_transaction()
    }

    #[instrument(skip(self, filter), fields(owner = %owner), err)]
    pub async fn list(
        &self,
        owner: UserId,
        filter: TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE owner_id = $1
              AND ($2::uuid IS NULL OR account_id = $2)
              AND ($3::text IS NULL OR kind = $3)
              AND ($4::timestamptz IS NULL OR effective_at >= $4)
              AND ($5::timestamptz IS NULL OR effective_at < $5)
            ORDER BY effective_at DESC, created_at DESC
            "#
        ))
        .bind(owner.as_uuid())
        .bind(filter.account_id.map(|a| *a.as_uuid()))
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions.list", e))?;

        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    /// Replace a transaction's values: reverse the old balance effect at the
    /// originally captured amount, then apply the new values as in create —
    /// both in the same SQL transaction as the row update.
    #[instrument(skip(self, update), fields(owner = %owner), err)]
    pub async fn update(
        &self,
        owner: UserId,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, StoreError> {
        if update.kind.is_transfer_leg() || update.kind == TransactionKind::Adjustment {
            return Err(DomainError::validation(
                "kind must be income or expense; use the transfer or adjustment endpoints",
            )
            .into());
        }
        validate_amount(update.amount)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("transactions.update.begin", e))?;

        let existing = fetch_for_update(&mut tx, owner, id).await?;
        if existing.kind.is_transfer_leg() {
            return Err(DomainError::validation(
                "transfer legs cannot be edited individually; delete the transfer instead",
            )
            .into());
        }
        if existing.kind == TransactionKind::Adjustment {
            return Err(DomainError::validation(
                "adjustments cannot be edited; adjust the account balance instead",
            )
            .into());
        }

        let in_account_currency;
        let reference = to_reference(
            self.rates.as_ref(),
            update.amount,
            update.currency,
            update.effective_at,
        )?;

        if existing.account_id == update.account_id {
            // Same account: validate only the combined result, so shrinking an
            // income below the current balance headroom behaves like one edit,
            // not two independent mutations.
            let account = fetch_account_for_update(&mut tx, owner, update.account_id).await?;
            account.ensure_active().map_err(StoreError::from)?;

            let converted = convert(
                self.rates.as_ref(),
                update.amount,
                update.currency,
                account.currency,
                update.effective_at,
            )?;
            in_account_currency = converted.amount;

            let net = existing.reversal_effect() + update.kind.sign() * converted.amount;
            let new_balance = account.balance_after(net).map_err(StoreError::from)?;
            update_balance(&mut tx, account.id, new_balance).await?;
        } else {
            // Moving accounts: each side is validated on its own. Lock in the
            // same stable order as create_transfer so two concurrent opposite
            // moves between the same pair cannot deadlock.
            let (first, second) = if existing.account_id.as_uuid() <= update.account_id.as_uuid() {
                (existing.account_id, update.account_id)
            } else {
                (update.account_id, existing.account_id)
            };
            let a = fetch_account_for_update(&mut tx, owner, first).await?;
            let b = fetch_account_for_update(&mut tx, owner, second).await?;
            let (old_account, new_account) = if a.id == existing.account_id {
                (a, b)
            } else {
                (b, a)
            };
            new_account.ensure_active().map_err(StoreError::from)?;

            let reversed = old_account
                .balance_after(existing.reversal_effect())
                .map_err(StoreError::from)?;

            let converted = convert(
                self.rates.as_ref(),
                update.amount,
                update.currency,
                new_account.currency,
                update.effective_at,
            )?;
            in_account_currency = converted.amount;

            let applied = new_account
                .balance_after(update.kind.sign() * converted.amount)
                .map_err(StoreError::from)?;

            update_balance(&mut tx, old_account.id, reversed).await?;
            update_balance(&mut tx, new_account.id, applied).await?;
        }

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions SET
                account_id = $3, kind = $4, category = $5, amount = $6, currency = $7,
                account_amount = $8, reference_rate = $9, reference_amount = $10,
                description = $11, effective_at = $12, updated_at = NOW()
            WHERE owner_id = $1 AND transaction_id = $2
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(update.account_id.as_uuid())
        .bind(update.kind.as_str())
        .bind(&update.category)
        .bind(update.amount)
        .bind(update.currency.as_str())
        .bind(in_account_currency)
        .bind(reference.to_reference)
        .bind(reference.amount)
        .bind(&update.description)
        .bind(update.effective_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("transactions.update.row", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transactions.update.commit", e))?;

        row.into_transaction()
    }

    /// Delete a transaction, reversing its balance effect in the same SQL
    /// transaction. Deleting either leg of a transfer removes and reverses
    /// both legs.
    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn delete(&self, owner: UserId, id: TransactionId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("transactions.delete.begin", e))?;

        let existing = fetch_for_update(&mut tx, owner, id).await?;

        let legs = match existing.transfer_group {
            Some(group) => {
                let rows = sqlx::query_as::<_, TransactionRow>(&format!(
                    "SELECT {TRANSACTION_COLUMNS} FROM transactions \
                     WHERE owner_id = $1 AND transfer_group = $2 FOR UPDATE"
                ))
                .bind(owner.as_uuid())
                .bind(group)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("transactions.delete.legs", e))?;

                rows.into_iter()
                    .map(TransactionRow::into_transaction)
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => vec![existing],
        };

        for leg in &legs {
            let account = fetch_account_for_update(&mut tx, owner, leg.account_id).await?;
            let reversed = account
                .balance_after(leg.reversal_effect())
                .map_err(StoreError::from)?;
            update_balance(&mut tx, account.id, reversed).await?;
            sqlx::query("DELETE FROM transactions WHERE transaction_id = $1")
                .bind(leg.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("transactions.delete.row", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transactions.delete.commit", e))?;
        Ok(())
    }

    /// Create both legs of a transfer and move both balances atomically.
    #[instrument(
        skip(self, transfer),
        fields(owner = %owner, from = %transfer.from_account, to = %transfer.to_account),
        err
    )]
    pub async fn create_transfer(
        &self,
        owner: UserId,
        transfer: NewTransfer,
    ) -> Result<(Transaction, Transaction), StoreError> {
        if transfer.from_account == transfer.to_account {
            return Err(DomainError::validation("cannot transfer an account to itself").into());
        }
        validate_amount(transfer.amount)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("transactions.transfer.begin", e))?;

        // Lock in a stable order so two concurrent opposite transfers cannot
        // deadlock.
        let (first, second) = if transfer.from_account.as_uuid() <= transfer.to_account.as_uuid() {
            (transfer.from_account, transfer.to_account)
        } else {
            (transfer.to_account, transfer.from_account)
        };
        let a = fetch_account_for_update(&mut tx, owner, first).await?;
        let b = fetch_account_for_update(&mut tx, owner, second).await?;
        let (source, destination) = if a.id == transfer.from_account {
            (a, b)
        } else {
            (b, a)
        };
        source.ensure_active().map_err(StoreError::from)?;
        destination.ensure_active().map_err(StoreError::from)?;

        let out_conv = convert(
            self.rates.as_ref(),
            transfer.amount,
            transfer.currency,
            source.currency,
            transfer.effective_at,
        )?;
        let in_conv = convert(
            self.rates.as_ref(),
            transfer.amount,
            transfer.currency,
            destination.currency,
            transfer.effective_at,
        )?;
        let reference = to_reference(
            self.rates.as_ref(),
            transfer.amount,
            transfer.currency,
            transfer.effective_at,
        )?;

        let source_balance = source
            .balance_after(-out_conv.amount)
            .map_err(StoreError::from)?;
        let destination_balance = destination
            .balance_after(in_conv.amount)
            .map_err(StoreError::from)?;

        let group = Uuid::now_v7();
        let out_leg = insert_row(
            &mut tx,
            owner,
            &NewTransaction {
                account_id: source.id,
                kind: TransactionKind::TransferOut,
                category: "transfer".to_string(),
                amount: transfer.amount,
                currency: transfer.currency,
                description: transfer.description.clone(),
                effective_at: transfer.effective_at,
            },
            out_conv.amount,
            reference.to_reference,
            reference.amount,
            Some(group),
        )
        .await?;
        let in_leg = insert_row(
            &mut tx,
            owner,
            &NewTransaction {
                account_id: destination.id,
                kind: TransactionKind::TransferIn,
                category: "transfer".to_string(),
                amount: transfer.amount,
                currency: transfer.currency,
                description: transfer.description,
                effective_at: transfer.effective_at,
            },
            in_conv.amount,
            reference.to_reference,
            reference.amount,
            Some(group),
        )
        .await?;

        update_balance(&mut tx, source.id, source_balance).await?;
        update_balance(&mut tx, destination.id, destination_balance).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("transactions.transfer.commit", e))?;

        Ok((out_leg.into_transaction()?, in_leg.into_transaction()?))
    }
}
