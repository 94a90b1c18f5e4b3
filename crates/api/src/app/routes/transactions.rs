use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use finbook_core::TransactionId;
use finbook_store::{NewTransaction, NewTransfer, TransactionFilter, TransactionUpdate};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/transfer", post(create_transfer))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    account_id: Option<String>,
    kind: Option<String>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    let mut filter = TransactionFilter {
        from: params.from,
        to: params.to,
        ..TransactionFilter::default()
    };
    if let Some(s) = &params.account_id {
        filter.account_id = match dto::parse_id("account_id", s) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        };
    }
    if let Some(s) = &params.kind {
        filter.kind = match dto::parse_transaction_kind(s) {
            Ok(k) => Some(k),
            Err(resp) => return resp,
        };
    }

    match services.transactions.list(ctx.owner(), filter).await {
        Ok(txns) => {
            let items = txns.iter().map(dto::transaction_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

fn parse_transaction_body(
    body: dto::TransactionRequest,
) -> Result<NewTransaction, axum::response::Response> {
    Ok(NewTransaction {
        account_id: dto::parse_id("account_id", &body.account_id)?,
        kind: dto::parse_transaction_kind(&body.kind)?,
        category: body.category,
        amount: dto::parse_amount("amount", &body.amount)?,
        currency: dto::parse_currency(&body.currency)?,
        description: body.description,
        effective_at: body.effective_at.unwrap_or_else(Utc::now),
    })
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Json(body): Json<dto::TransactionRequest>,
) -> axum::response::Response {
    let new = match parse_transaction_body(body) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    match services.transactions.create(ctx.owner(), new).await {
        Ok(txn) => (StatusCode::CREATED, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    let transfer = NewTransfer {
        from_account: match dto::parse_id("from_account", &body.from_account) {
            Ok(id) => id,
            Err(resp) => return resp,
        },
        to_account: match dto::parse_id("to_account", &body.to_account) {
            Ok(id) => id,
            Err(resp) => return resp,
        },
        amount: match dto::parse_amount("amount", &body.amount) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        currency: match dto::parse_currency(&body.currency) {
            Ok(c) => c,
            Err(resp) => return resp,
        },
        description: body.description,
        effective_at: body.effective_at.unwrap_or_else(Utc::now),
    };

    match services.transactions.create_transfer(ctx.owner(), transfer).await {
        Ok((out_leg, in_leg)) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "out": dto::transaction_to_json(&out_leg),
                "in": dto::transaction_to_json(&in_leg),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match dto::parse_id("transaction id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transactions.get(ctx.owner(), id).await {
        Ok(txn) => (StatusCode::OK, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransactionRequest>,
) -> axum::response::Response {
    let id: TransactionId = match dto::parse_id("transaction id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let new = match parse_transaction_body(body) {
        Ok(n) => n,
        Err(resp) => return resp,
    };
    let update = TransactionUpdate {
        account_id: new.account_id,
        kind: new.kind,
        category: new.category,
        amount: new.amount,
        currency: new.currency,
        description: new.description,
        effective_at: new.effective_at,
    };
    match services.transactions.update(ctx.owner(), id, update).await {
        Ok(txn) => (StatusCode::OK, Json(dto::transaction_to_json(&txn))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TransactionId = match dto::parse_id("transaction id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.transactions.delete(ctx.owner(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
