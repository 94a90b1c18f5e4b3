//! Database-backed repository tests.
//!
//! These require a running Postgres and are `#[ignore]`d by default. Point
//! `DATABASE_URL` at a scratch database and run with `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use finbook_core::Currency;
use finbook_fx::{RateSnapshot, SharedRateTable};
use finbook_ledger::{AccountKind, BorrowingStatus, Direction, TransactionKind};

use crate::accounts::{AccountDeletion, AccountRepo, NewAccount};
use crate::borrowings::{BorrowingRepo, BorrowingUpdate, NewBorrowing};
use crate::error::StoreError;
use crate::shifts::{NewShift, ShiftRepo};
use crate::transactions::{
    NewTransaction, NewTransfer, TransactionFilter, TransactionRepo, TransactionUpdate,
};
use crate::users::{NewUser, UserRepo};
use crate::{migrations, pool};

struct Harness {
    pool: sqlx::PgPool,
    rates: SharedRateTable,
}

impl Harness {
    async fn connect() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a scratch db");
        let pool = pool::connect(&url).await.expect("connect");
        migrations::run(&pool).await.expect("migrations");

        let rates = SharedRateTable::default();
        rates.insert(
            RateSnapshot::new(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
                .with_rate(Currency::Eur, 0.92)
                .with_rate(Currency::Gbp, 0.79),
        );
        Self { pool, rates }
    }

    fn provider(&self) -> Arc<dyn finbook_fx::RateProvider> {
        Arc::new(self.rates.clone())
    }

    fn accounts(&self) -> AccountRepo {
        AccountRepo::new(self.pool.clone(), self.provider())
    }

    fn transactions(&self) -> TransactionRepo {
        TransactionRepo::new(self.pool.clone(), self.provider())
    }

    async fn user(&self) -> finbook_core::UserId {
        let unique = uuid::Uuid::now_v7();
        UserRepo::new(self.pool.clone())
            .create(NewUser {
                email: format!("{unique}@test.local"),
                display_name: "Test".to_string(),
                password_hash: "unused".to_string(),
            })
            .await
            .expect("create user")
            .id()
    }
}

fn usd_account(balance: i64) -> NewAccount {
    NewAccount {
        name: "checking".to_string(),
        kind: AccountKind::Checking,
        currency: Currency::Usd,
        balance,
    }
}

fn expense(account_id: finbook_core::AccountId, amount: i64, currency: Currency) -> NewTransaction {
    NewTransaction {
        account_id,
        kind: TransactionKind::Expense,
        category: "general".to_string(),
        amount,
        currency,
        description: None,
        effective_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    }
}

fn income(account_id: finbook_core::AccountId, amount: i64, currency: Currency) -> NewTransaction {
    NewTransaction {
        kind: TransactionKind::Income,
        ..expense(account_id, amount, currency)
    }
}

fn replacement(new: &NewTransaction) -> TransactionUpdate {
    TransactionUpdate {
        account_id: new.account_id,
        kind: new.kind,
        category: new.category.clone(),
        amount: new.amount,
        currency: new.currency,
        description: new.description.clone(),
        effective_at: new.effective_at,
    }
}

#[tokio::test]
#[ignore]
async fn expense_moves_balance_and_delete_restores_it() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(100_000)).await.unwrap();

    let txn = h
        .transactions()
        .create(owner, expense(account.id, 7_525, Currency::Usd))
        .await
        .unwrap();
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 92_475);

    h.transactions().delete(owner, txn.id).await.unwrap();
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 100_000);
}

#[tokio::test]
#[ignore]
async fn cross_currency_expense_converts_at_snapshot_rate() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(100_000)).await.unwrap();

    // 100 EUR at 0.92 EUR/USD costs round(10000 / 0.92) = 10870 USD minor.
    let txn = h
        .transactions()
        .create(owner, expense(account.id, 10_000, Currency::Eur))
        .await
        .unwrap();
    assert_eq!(txn.account_amount, 10_870);
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 89_130);
}

#[tokio::test]
#[ignore]
async fn overdraft_on_non_credit_account_rolls_back_everything() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(5_000)).await.unwrap();

    let err = h
        .transactions()
        .create(owner, expense(account.id, 6_000, Currency::Usd))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Ledger(_)));

    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 5_000);
    let listed = h
        .transactions()
        .list(owner, TransactionFilter::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
#[ignore]
async fn transfer_posts_both_legs_and_delete_reverses_both() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let from = h.accounts().create(owner, usd_account(50_000)).await.unwrap();
    let to = h
        .accounts()
        .create(
            owner,
            NewAccount {
                name: "savings".to_string(),
                kind: AccountKind::Savings,
                currency: Currency::Usd,
                balance: 0,
            },
        )
        .await
        .unwrap();

    let (out_leg, in_leg) = h
        .transactions()
        .create_transfer(
            owner,
            NewTransfer {
                from_account: from.id,
                to_account: to.id,
                amount: 20_000,
                currency: Currency::Usd,
                description: None,
                effective_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            },
        )
        .await
        .unwrap();
    assert_eq!(out_leg.transfer_group, in_leg.transfer_group);
    assert_eq!(h.accounts().get(owner, from.id).await.unwrap().balance, 30_000);
    assert_eq!(h.accounts().get(owner, to.id).await.unwrap().balance, 20_000);

    // Deleting one leg removes the pair.
    h.transactions().delete(owner, in_leg.id).await.unwrap();
    assert_eq!(h.accounts().get(owner, from.id).await.unwrap().balance, 50_000);
    assert_eq!(h.accounts().get(owner, to.id).await.unwrap().balance, 0);
    assert!(matches!(
        h.transactions().get(owner, out_leg.id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
#[ignore]
async fn update_on_same_account_applies_the_net_effect() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(0)).await.unwrap();

    let earned = h
        .transactions()
        .create(owner, income(account.id, 10_000, Currency::Usd))
        .await
        .unwrap();
    let spent = h
        .transactions()
        .create(owner, expense(account.id, 8_000, Currency::Usd))
        .await
        .unwrap();
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 2_000);

    // Shrinking the income is one edit: reversing it alone would overdraw the
    // account, but the net effect (-1000) leaves the balance valid.
    let edited = h
        .transactions()
        .update(owner, earned.id, replacement(&income(account.id, 9_000, Currency::Usd)))
        .await
        .unwrap();
    assert_eq!(edited.amount, 9_000);
    assert_eq!(edited.account_amount, 9_000);
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 1_000);

    // Flipping the kind reverses the old effect and applies the new one.
    let flipped = h
        .transactions()
        .update(owner, spent.id, replacement(&income(account.id, 500, Currency::Usd)))
        .await
        .unwrap();
    assert_eq!(flipped.kind, TransactionKind::Income);
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 9_500);
}

#[tokio::test]
#[ignore]
async fn update_moves_transaction_between_accounts() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let a = h.accounts().create(owner, usd_account(50_000)).await.unwrap();
    let b = h
        .accounts()
        .create(
            owner,
            NewAccount {
                name: "savings".to_string(),
                kind: AccountKind::Savings,
                currency: Currency::Usd,
                balance: 0,
            },
        )
        .await
        .unwrap();

    let txn = h
        .transactions()
        .create(owner, income(a.id, 7_525, Currency::Usd))
        .await
        .unwrap();
    assert_eq!(h.accounts().get(owner, a.id).await.unwrap().balance, 57_525);

    let moved = h
        .transactions()
        .update(owner, txn.id, replacement(&income(b.id, 7_525, Currency::Usd)))
        .await
        .unwrap();
    assert_eq!(moved.account_id, b.id);
    assert_eq!(h.accounts().get(owner, a.id).await.unwrap().balance, 50_000);
    assert_eq!(h.accounts().get(owner, b.id).await.unwrap().balance, 7_525);
}

#[tokio::test]
#[ignore]
async fn owner_scoping_hides_other_users_rows() {
    let h = Harness::connect().await;
    let alice = h.user().await;
    let bob = h.user().await;
    let account = h.accounts().create(alice, usd_account(1_000)).await.unwrap();

    assert!(matches!(
        h.accounts().get(bob, account.id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        h.transactions()
            .create(bob, expense(account.id, 100, Currency::Usd))
            .await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
#[ignore]
async fn account_with_history_is_deactivated_not_deleted() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(10_000)).await.unwrap();
    h.transactions()
        .create(owner, expense(account.id, 1_000, Currency::Usd))
        .await
        .unwrap();

    let outcome = h.accounts().delete(owner, account.id, false).await.unwrap();
    assert_eq!(outcome, AccountDeletion::Deactivated);
    assert!(!h.accounts().get(owner, account.id).await.unwrap().active);

    let outcome = h.accounts().delete(owner, account.id, true).await.unwrap();
    assert_eq!(outcome, AccountDeletion::Deleted);
    assert!(matches!(
        h.accounts().get(owner, account.id).await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
#[ignore]
async fn borrowing_payment_lifecycle_persists() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let repo = BorrowingRepo::new(h.pool.clone(), h.provider());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    let b = repo
        .create(
            owner,
            NewBorrowing {
                direction: Direction::Borrowed,
                counterparty: "alice".to_string(),
                principal: 20_000,
                currency: Currency::Usd,
                due_at: now + Duration::days(30),
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(b.status(now), BorrowingStatus::Pending);

    let b = repo.record_payment(owner, b.id, 20_000, now).await.unwrap();
    assert_eq!(b.status(now), BorrowingStatus::Paid);

    let err = repo.record_payment(owner, b.id, 1, now).await.unwrap_err();
    assert!(matches!(err, StoreError::Ledger(_)));
    assert_eq!(repo.get(owner, b.id).await.unwrap().paid, 20_000);
}

#[tokio::test]
#[ignore]
async fn borrowing_principal_edit_rescales_reference_amount() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let repo = BorrowingRepo::new(h.pool.clone(), h.provider());
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    // 100 EUR at 0.92 EUR/USD → round(10000 / 0.92) = 10870 USD minor.
    let b = repo
        .create(
            owner,
            NewBorrowing {
                direction: Direction::Lent,
                counterparty: "bob".to_string(),
                principal: 10_000,
                currency: Currency::Eur,
                due_at: now + Duration::days(30),
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(b.reference_amount, 10_870);

    // Doubling the principal keeps the creation-time rate but rescales the
    // reference equivalent to the new principal.
    let b = repo
        .update(
            owner,
            b.id,
            BorrowingUpdate {
                counterparty: "bob".to_string(),
                principal: 20_000,
                due_at: now + Duration::days(30),
            },
        )
        .await
        .unwrap();
    assert_eq!(b.principal, 20_000);
    assert_eq!(b.reference_amount, 21_739);
    assert!((b.reference_rate - 1.0 / 0.92).abs() < 1e-12);
}

#[tokio::test]
#[ignore]
async fn shift_income_link_follows_the_shift() {
    let h = Harness::connect().await;
    let owner = h.user().await;
    let account = h.accounts().create(owner, usd_account(0)).await.unwrap();
    let repo = ShiftRepo::new(h.pool.clone(), h.provider());

    let shift = repo
        .create(
            owner,
            NewShift {
                date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                position: "barista".to_string(),
                hourly_rate: 2_000,
                start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                tips: 1_500,
                income_account: Some(account.id),
            },
        )
        .await
        .unwrap();

    // 8h overnight at $20.00/h plus tips.
    assert_eq!(shift.total_earnings(), 17_500);
    assert!(shift.income_transaction.is_some());
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 17_500);

    repo.delete(owner, shift.id).await.unwrap();
    assert_eq!(h.accounts().get(owner, account.id).await.unwrap().balance, 0);
}
