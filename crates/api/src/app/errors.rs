use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use finbook_core::DomainError;
use finbook_ledger::LedgerError;
use finbook_store::StoreError;

/// Map the store/domain error taxonomy to an HTTP response. Done here exactly
/// once, so every handler returns identical shapes for identical failures.
pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::Ledger(e) => ledger_error_to_response(e),
        StoreError::Fx(e) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "conversion_error",
            e.to_string(),
        ),
        StoreError::Database { .. } => {
            tracing::error!(error = %err, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "internal storage error",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", "unauthorized")
        }
    }
}

fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InactiveAccount => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "inactive_account",
            err.to_string(),
        ),
        LedgerError::InsufficientFunds { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "insufficient_funds",
            err.to_string(),
        ),
        LedgerError::PaymentExceedsPrincipal { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "payment_exceeds_principal",
            err.to_string(),
        ),
        LedgerError::BorrowingAlreadySettled => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "borrowing_settled",
            err.to_string(),
        ),
        LedgerError::AmountOverflow => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "amount_overflow",
            err.to_string(),
        ),
        LedgerError::Domain(e) => domain_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
