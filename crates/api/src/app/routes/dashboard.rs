use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::Deserialize;

use finbook_core::major_string;
use finbook_store::DashboardSummary;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new().route("/summary", get(summary))
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    /// "YYYY-MM"; defaults to the current month.
    month: Option<String>,
}

fn parse_month(s: &str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "month must be formatted as YYYY-MM",
        )
    })
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
    Query(params): Query<SummaryParams>,
) -> axum::response::Response {
    let now = Utc::now();
    let month = match params.month.as_deref() {
        Some(s) => match parse_month(s) {
            Ok(d) => d,
            Err(resp) => return resp,
        },
        None => now.date_naive().with_day(1).unwrap_or(now.date_naive()),
    };

    match services.dashboard.summary(ctx.owner(), month, now).await {
        Ok(summary) => (StatusCode::OK, Json(summary_to_json(&summary))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

fn summary_to_json(summary: &DashboardSummary) -> serde_json::Value {
    serde_json::json!({
        "month": summary.month.format("%Y-%m").to_string(),
        "account_totals": summary.account_totals.iter().map(|t| {
            serde_json::json!({
                "currency": t.currency.as_str(),
                "balance": major_string(t.balance),
                "reference_balance": major_string(t.reference_balance),
            })
        }).collect::<Vec<_>>(),
        "net_worth": major_string(summary.net_worth),
        "month_income": major_string(summary.month_income),
        "month_expense": major_string(summary.month_expense),
        "owed_by_me": major_string(summary.owed_by_me),
        "owed_to_me": major_string(summary.owed_to_me),
    })
}
