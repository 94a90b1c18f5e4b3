//! Account persistence and balance adjustments.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction as SqlTx};
use tracing::instrument;
use uuid::Uuid;

use finbook_core::{AccountId, Currency, TransactionId, UserId};
use finbook_fx::{RateProvider, to_reference};
use finbook_ledger::{Account, AccountKind, TransactionKind};

use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, FromRow)]
pub(crate) struct AccountRow {
    pub account_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub kind: String,
    pub balance: i64,
    pub currency: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    pub(crate) fn into_account(self) -> Result<Account, StoreError> {
        Ok(Account {
            id: AccountId::from_uuid(self.account_id),
            owner: UserId::from_uuid(self.owner_id),
            name: self.name,
            kind: AccountKind::from_str(&self.kind)?,
            balance: self.balance,
            currency: Currency::from_str(&self.currency)?,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const ACCOUNT_COLUMNS: &str =
    "account_id, owner_id, name, kind, balance, currency, active, created_at, updated_at";

/// Load an account row-locked for the remainder of the surrounding SQL
/// transaction. Owner scoping makes cross-user access impossible.
pub(crate) async fn fetch_account_for_update(
    tx: &mut SqlTx<'_, Postgres>,
    owner: UserId,
    id: AccountId,
) -> Result<Account, StoreError> {
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 AND account_id = $2 FOR UPDATE"
    ))
    .bind(owner.as_uuid())
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("accounts.lock", e))?
    .ok_or(StoreError::NotFound)?;

    row.into_account()
}

/// Write a new balance inside the surrounding SQL transaction.
pub(crate) async fn update_balance(
    tx: &mut SqlTx<'_, Postgres>,
    id: AccountId,
    new_balance: i64,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE accounts SET balance = $2, updated_at = NOW() WHERE account_id = $1")
        .bind(id.as_uuid())
        .bind(new_balance)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("accounts.update_balance", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub kind: AccountKind,
    pub currency: Currency,
    /// Opening balance in minor units.
    pub balance: i64,
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountDeletion {
    /// The row (and, under force, its transactions) is gone.
    Deleted,
    /// Transactions still reference the account; it was deactivated instead.
    Deactivated,
}

#[derive(Clone)]
pub struct AccountRepo {
    pool: PgPool,
    rates: Arc<dyn RateProvider>,
}

impl AccountRepo {
    pub fn new(pool: PgPool, rates: Arc<dyn RateProvider>) -> Self {
        Self { pool, rates }
    }

    #[instrument(skip(self, account), fields(owner = %owner), err)]
    pub async fn create(&self, owner: UserId, account: NewAccount) -> Result<Account, StoreError> {
        if account.balance < 0 && !account.kind.allows_negative() {
            return Err(finbook_ledger::LedgerError::InsufficientFunds {
                balance: 0,
                delta: account.balance,
            }
            .into());
        }

        let id = AccountId::new();
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (account_id, owner_id, name, kind, balance, currency)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(owner.as_uuid())
        .bind(&account.name)
        .bind(account.kind.as_str())
        .bind(account.balance)
        .bind(account.currency.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts.create", e))?;

        row.into_account()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn get(&self, owner: UserId, id: AccountId) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 AND account_id = $2"
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts.get", e))?
        .ok_or(StoreError::NotFound)?;

        row.into_account()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn list(&self, owner: UserId) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE owner_id = $1 ORDER BY created_at"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts.list", e))?;

        rows.into_iter().map(AccountRow::into_account).collect()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn rename(
        &self,
        owner: UserId,
        id: AccountId,
        name: &str,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts SET name = $3, updated_at = NOW()
            WHERE owner_id = $1 AND account_id = $2
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts.rename", e))?
        .ok_or(StoreError::NotFound)?;

        row.into_account()
    }

    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn set_active(
        &self,
        owner: UserId,
        id: AccountId,
        active: bool,
    ) -> Result<Account, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts SET active = $3, updated_at = NOW()
            WHERE owner_id = $1 AND account_id = $2
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("accounts.set_active", e))?
        .ok_or(StoreError::NotFound)?;

        row.into_account()
    }

    /// Set the balance to an explicit target by synthesizing an offsetting
    /// adjustment transaction for the difference, atomically with the balance
    /// write.
    #[instrument(skip(self), fields(owner = %owner), err)]
    pub async fn adjust_balance(
        &self,
        owner: UserId,
        id: AccountId,
        target_balance: i64,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("accounts.adjust.begin", e))?;

        let mut account = fetch_account_for_update(&mut tx, owner, id).await?;
        account.ensure_active().map_err(StoreError::from)?;

        let diff = target_balance
            .checked_sub(account.balance)
            .ok_or(finbook_ledger::LedgerError::AmountOverflow)?;
        if diff == 0 {
            return Ok(account);
        }

        // Re-validates the negative-balance rule for the target.
        let new_balance = account.balance_after(diff).map_err(StoreError::from)?;

        let reference = to_reference(self.rates.as_ref(), diff, account.currency, now)?;

        sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, owner_id, account_id, kind, category, amount, currency,
                account_amount, reference_rate, reference_amount, description, effective_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(TransactionId::new().as_uuid())
        .bind(owner.as_uuid())
        .bind(id.as_uuid())
        .bind(TransactionKind::Adjustment.as_str())
        .bind("adjustment")
        .bind(diff)
        .bind(account.currency.as_str())
        .bind(diff)
        .bind(reference.to_reference)
        .bind(reference.amount)
        .bind(Option::<String>::None)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("accounts.adjust.insert", e))?;

        update_balance(&mut tx, id, new_balance).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("accounts.adjust.commit", e))?;

        account.balance = new_balance;
        account.updated_at = now;
        Ok(account)
    }

    /// Delete an account.
    ///
    /// Empty accounts are hard-deleted. Accounts with transactions are
    /// deactivated unless `force` is set, in which case the transactions (and
    /// any partner transfer legs, with their balance effects reversed) go too.
    #[instrument(skip(self), fields(owner = %owner, force), err)]
    pub async fn delete(
        &self,
        owner: UserId,
        id: AccountId,
        force: bool,
    ) -> Result<AccountDeletion, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("accounts.delete.begin", e))?;

        let account = fetch_account_for_update(&mut tx, owner, id).await?;

        let txn_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transactions WHERE account_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("accounts.delete.count", e))?;

        if txn_count > 0 && !force {
            sqlx::query(
                "UPDATE accounts SET active = FALSE, updated_at = NOW() WHERE account_id = $1",
            )
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("accounts.delete.deactivate", e))?;

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("accounts.delete.commit", e))?;
            return Ok(AccountDeletion::Deactivated);
        }

        if txn_count > 0 {
            // Partner legs of transfers into/out of this account live on other
            // accounts; reverse their balance effect before removing them so
            // those balances keep matching their extant transactions.
            let partners = sqlx::query_as::<_, crate::transactions::TransactionRow>(&format!(
                r#"
                SELECT {cols} FROM transactions
                WHERE transfer_group IN (
                    SELECT transfer_group FROM transactions
                    WHERE account_id = $1 AND transfer_group IS NOT NULL
                )
                AND account_id <> $1
                FOR UPDATE
                "#,
                cols = crate::transactions::TRANSACTION_COLUMNS,
            ))
            .bind(id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("accounts.delete.partners", e))?;

            for row in partners {
                let partner = row.into_transaction()?;
                let partner_account =
                    fetch_account_for_update(&mut tx, owner, partner.account_id).await?;
                let reversed = partner_account
                    .balance
                    .checked_add(partner.reversal_effect())
                    .ok_or(finbook_ledger::LedgerError::AmountOverflow)?;
                update_balance(&mut tx, partner.account_id, reversed).await?;
                sqlx::query("DELETE FROM transactions WHERE transaction_id = $1")
                    .bind(partner.id.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("accounts.delete.partner_row", e))?;
            }

            sqlx::query("DELETE FROM transactions WHERE account_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("accounts.delete.transactions", e))?;
        }

        sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(account.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("accounts.delete.row", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("accounts.delete.commit", e))?;

        Ok(AccountDeletion::Deleted)
    }
}
