use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use finbook_core::AccountId;
use finbook_store::{AccountDeletion, NewAccount};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).patch(update).delete(delete_one))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.accounts.list(ctx.owner()).await {
        Ok(accounts) => {
            let items = accounts.iter().map(dto::account_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Json(body): Json<dto::CreateAccountRequest>,
) -> axum::response::Response {
    if body.name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "account name must not be empty",
        );
    }
    let kind = match dto::parse_account_kind(&body.kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let currency = match dto::parse_currency(&body.currency) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let balance = match body.opening_balance.as_deref() {
        Some(s) => match dto::parse_amount("opening_balance", s) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        None => 0,
    };

    match services
        .accounts
        .create(
            ctx.owner(),
            NewAccount {
                name: body.name.trim().to_string(),
                kind,
                currency,
                balance,
            },
        )
        .await
    {
        Ok(account) => {
            (StatusCode::CREATED, Json(dto::account_to_json(&account))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: AccountId = match dto::parse_id("account id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.accounts.get(ctx.owner(), id).await {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Rename, activate/deactivate, and/or set the balance to an explicit target.
/// A balance target synthesizes an adjustment transaction for the difference.
pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateAccountRequest>,
) -> axum::response::Response {
    let id: AccountId = match dto::parse_id("account id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let owner = ctx.owner();

    let mut account = None;

    if let Some(name) = &body.name {
        if name.trim().is_empty() {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "account name must not be empty",
            );
        }
        match services.accounts.rename(owner, id, name.trim()).await {
            Ok(a) => account = Some(a),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    if let Some(active) = body.active {
        match services.accounts.set_active(owner, id, active).await {
            Ok(a) => account = Some(a),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    if let Some(balance) = &body.balance {
        let target = match dto::parse_amount("balance", balance) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        match services
            .accounts
            .adjust_balance(owner, id, target, Utc::now())
            .await
        {
            Ok(a) => account = Some(a),
            Err(e) => return errors::store_error_to_response(e),
        }
    }

    // No recognized field given: return the current state.
    let account = match account {
        Some(a) => a,
        None => match services.accounts.get(owner, id).await {
            Ok(a) => a,
            Err(e) => return errors::store_error_to_response(e),
        },
    };

    (StatusCode::OK, Json(dto::account_to_json(&account))).into_response()
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    force: bool,
}

pub async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> axum::response::Response {
    let id: AccountId = match dto::parse_id("account id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.accounts.delete(ctx.owner(), id, params.force).await {
        Ok(AccountDeletion::Deleted) => StatusCode::NO_CONTENT.into_response(),
        Ok(AccountDeletion::Deactivated) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "deleted": false,
                "deactivated": true,
                "message": "account has transactions; deactivated instead (use ?force=true to delete)",
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
