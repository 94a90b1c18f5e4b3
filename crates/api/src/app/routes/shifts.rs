use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;

use finbook_core::ShiftId;
use finbook_store::{NewShift, ShiftUpdate};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(get_one).put(update).delete(delete_one))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Query(params): Query<ListParams>,
) -> axum::response::Response {
    match services.shifts.list(ctx.owner(), params.from, params.to).await {
        Ok(shifts) => {
            let items = shifts.iter().map(dto::shift_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Json(body): Json<dto::ShiftRequest>,
) -> axum::response::Response {
    let hourly_rate = match dto::parse_amount("hourly_rate", &body.hourly_rate) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let tips = match body.tips.as_deref() {
        Some(s) => match dto::parse_amount("tips", s) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        None => 0,
    };
    let income_account = match body.income_account.as_deref() {
        Some(s) => match dto::parse_id("income_account", s) {
            Ok(id) => Some(id),
            Err(resp) => return resp,
        },
        None => None,
    };

    let new = NewShift {
        date: body.date,
        position: body.position,
        hourly_rate,
        start: body.start,
        end: body.end,
        tips,
        income_account,
    };

    match services.shifts.create(ctx.owner(), new).await {
        Ok(shift) => (StatusCode::CREATED, Json(dto::shift_to_json(&shift))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ShiftId = match dto::parse_id("shift id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.shifts.get(ctx.owner(), id).await {
        Ok(shift) => (StatusCode::OK, Json(dto::shift_to_json(&shift))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ShiftRequest>,
) -> axum::response::Response {
    let id: ShiftId = match dto::parse_id("shift id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if body.income_account.is_some() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "income_account can only be set when creating a shift",
        );
    }
    let hourly_rate = match dto::parse_amount("hourly_rate", &body.hourly_rate) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let tips = match body.tips.as_deref() {
        Some(s) => match dto::parse_amount("tips", s) {
            Ok(v) => v,
            Err(resp) => return resp,
        },
        None => 0,
    };

    let update = ShiftUpdate {
        date: body.date,
        position: body.position,
        hourly_rate,
        start: body.start,
        end: body.end,
        tips,
    };

    match services.shifts.update(ctx.owner(), id, update).await {
        Ok(shift) => (StatusCode::OK, Json(dto::shift_to_json(&shift))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_one(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ShiftId = match dto::parse_id("shift id", &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.shifts.delete(ctx.owner(), id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
