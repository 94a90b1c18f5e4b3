//! Request/response DTOs and JSON mapping helpers.
//!
//! Monetary amounts cross the HTTP boundary as decimal major-unit strings
//! ("75.25") and are parsed into minor units exactly once, here. Responses
//! carry both the decimal string and the raw minor-unit integer.

use std::str::FromStr;

use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use finbook_core::{Currency, major_string, minor_from_major_str};
use finbook_ledger::{
    Account, AccountKind, Borrowing, Direction, Transaction, TransactionKind, WorkShift,
};

use crate::app::errors::json_error;

// ---- request bodies ----

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    pub kind: String,
    pub currency: String,
    /// Decimal major-unit string; defaults to zero.
    pub opening_balance: Option<String>,
}

/// Partial account update: rename, activate/deactivate, or set the balance
/// to an explicit target (which synthesizes an adjustment transaction).
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub balance: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    pub account_id: String,
    pub kind: String,
    pub category: String,
    pub amount: String,
    pub currency: String,
    pub description: Option<String>,
    /// Defaults to the request time.
    pub effective_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    pub amount: String,
    pub currency: String,
    pub description: Option<String>,
    pub effective_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BorrowingRequest {
    pub direction: String,
    pub counterparty: String,
    pub principal: String,
    pub currency: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct BorrowingUpdateRequest {
    pub counterparty: String,
    pub principal: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct ShiftRequest {
    pub date: NaiveDate,
    pub position: String,
    /// Major-unit hourly rate string ("18.00").
    pub hourly_rate: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub tips: Option<String>,
    /// Create-only: post total earnings as income on this account.
    pub income_account: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateSnapshotRequest {
    pub as_of: DateTime<Utc>,
    /// Units of each currency per one reference unit.
    pub rates: std::collections::HashMap<String, f64>,
}

// ---- parsing helpers ----

pub fn parse_amount(field: &'static str, s: &str) -> Result<i64, axum::response::Response> {
    minor_from_major_str(s)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{field}: {e}")))
}

pub fn parse_currency(s: &str) -> Result<Currency, axum::response::Response> {
    Currency::from_str(s).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_currency",
            format!("unsupported currency '{s}'"),
        )
    })
}

pub fn parse_account_kind(s: &str) -> Result<AccountKind, axum::response::Response> {
    AccountKind::from_str(s).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_account_kind",
            "kind must be one of: checking, savings, credit, investment, cash",
        )
    })
}

pub fn parse_transaction_kind(s: &str) -> Result<TransactionKind, axum::response::Response> {
    TransactionKind::from_str(s).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_transaction_kind",
            format!("unknown transaction kind '{s}'"),
        )
    })
}

pub fn parse_direction(s: &str) -> Result<Direction, axum::response::Response> {
    Direction::from_str(s).map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_direction",
            "direction must be borrowed or lent",
        )
    })
}

pub fn parse_id<T: FromStr>(field: &'static str, s: &str) -> Result<T, axum::response::Response> {
    s.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("{field} is not a valid id"),
        )
    })
}

// ---- response mapping ----

pub fn account_to_json(account: &Account) -> Value {
    json!({
        "id": account.id.to_string(),
        "name": account.name,
        "kind": account.kind.as_str(),
        "currency": account.currency.as_str(),
        "balance": major_string(account.balance),
        "balance_minor": account.balance,
        "active": account.active,
        "created_at": account.created_at,
        "updated_at": account.updated_at,
    })
}

pub fn transaction_to_json(txn: &Transaction) -> Value {
    json!({
        "id": txn.id.to_string(),
        "account_id": txn.account_id.to_string(),
        "kind": txn.kind.as_str(),
        "category": txn.category,
        "amount": major_string(txn.amount),
        "amount_minor": txn.amount,
        "currency": txn.currency.as_str(),
        "account_amount": major_string(txn.account_amount),
        "account_amount_minor": txn.account_amount,
        "reference_rate": txn.reference_rate,
        "reference_amount": major_string(txn.reference_amount),
        "reference_amount_minor": txn.reference_amount,
        "description": txn.description,
        "effective_at": txn.effective_at,
        "transfer_group": txn.transfer_group,
        "created_at": txn.created_at,
        "updated_at": txn.updated_at,
    })
}

pub fn borrowing_to_json(borrowing: &Borrowing, now: DateTime<Utc>) -> Value {
    json!({
        "id": borrowing.id.to_string(),
        "direction": borrowing.direction.as_str(),
        "counterparty": borrowing.counterparty,
        "principal": major_string(borrowing.principal),
        "principal_minor": borrowing.principal,
        "currency": borrowing.currency.as_str(),
        "reference_rate": borrowing.reference_rate,
        "reference_amount": major_string(borrowing.reference_amount),
        "paid": major_string(borrowing.paid),
        "paid_minor": borrowing.paid,
        "remaining": major_string(borrowing.remaining()),
        "status": borrowing.status(now),
        "due_at": borrowing.due_at,
        "created_at": borrowing.created_at,
        "updated_at": borrowing.updated_at,
    })
}

pub fn shift_to_json(shift: &WorkShift) -> Value {
    json!({
        "id": shift.id.to_string(),
        "date": shift.date,
        "position": shift.position,
        "hourly_rate": major_string(shift.hourly_rate),
        "start": shift.start,
        "end": shift.end,
        "tips": major_string(shift.tips),
        "hours_worked": shift.hours_worked(),
        "base_earnings": major_string(shift.base_earnings()),
        "total_earnings": major_string(shift.total_earnings()),
        "income_transaction_id": shift.income_transaction.map(|id| id.to_string()),
        "created_at": shift.created_at,
        "updated_at": shift.updated_at,
    })
}
