use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use finbook_core::BorrowingId;
use finbook_ledger::BorrowingStatus;
use finbook_store::{BorrowingUpdate, NewBorrowing};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(delete_one))
        .route("/:id/payments", post(record_payment))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    status: Option<String>,
}

fn parse_status(s: &str) -> Result<BorrowingStatus, axum::response::Response> {
    match s {
        "pending" => Ok(BorrowingStatus::Pending),
        "partially_paid" => Ok(BorrowingStatus::PartiallyPaid),
        "paid" => Ok(BorrowingStatus::Paid),
        "overdue" => Ok(BorrowingStatus::Overdue),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_status",
            "status must be one of: pending, partially_paid, paid, overdue",
        )),
    }
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    let status = match params.status.as_deref() {
        Some(s) => match parse_status(s) {
            Ok(status) => Some(status),
            Err(resp) => return resp,
        },
        None => None,
    };

    let now = Utc::now();
    match services.borrowings.list(ctx.owner(), status, now).await {
        Ok(borrowings) => {
            let items = borrowings
                .iter()
                .map(|b| dto::borrowing_to_json(b, now))
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Json(body): Json<dto::BorrowingRequest>,
) -> axum::response::Response {
    let new = NewBorrowing {
        direction: match dto::parse_direction(&body.direction) {
            Ok(d) => d,
            Err(resp) => return resp,
        },
        counterparty: body.counterparty,
        principal: match dto::parse_amount("principal", &body.principal) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        currency: match dto::parse_currency(&body.currency) {
            Ok(c) => c,
            Err(resp) => return resp,
        },
        due_at: body.due_at,
    };

    let now = Utc::now();
    match services.borrowings.create(ctx.owner(), new, now).await {
        Ok(b) => (StatusCode::CREATED, Json(dto::borrowing_to_json(&b, now))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BorrowingId = match dto::parse_id("borrowing id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.borrowings.get(ctx.owner(), id).await {
        Ok(b) => (StatusCode::OK, Json(dto::borrowing_to_json(&b, Utc::now()))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::BorrowingUpdateRequest>,
) -> axum::response::Response {
    let id: BorrowingId = match dto::parse_id("borrowing id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let update = BorrowingUpdate {
        counterparty: body.counterparty,
        principal: match dto::parse_amount("principal", &body.principal) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        due_at: body.due_at,
    };
    match services.borrowings.update(ctx.owner(), id, update).await {
        Ok(b) => (StatusCode::OK, Json(dto::borrowing_to_json(&b, Utc::now()))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BorrowingId = match dto::parse_id("borrowing id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.borrowings.delete(ctx.owner(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PaymentRequest>,
) -> axum::response::Response {
    let id: BorrowingId = match dto::parse_id("borrowing id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let amount = match dto::parse_amount("amount", &body.amount) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let now = Utc::now();
    match services
        .borrowings
        .record_payment(ctx.owner(), id, amount, now)
        .await
    {
        Ok(b) => (StatusCode::OK, Json(dto::borrowing_to_json(&b, now))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
