//! Exchange-rate table inspection and refresh.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use finbook_fx::RateSnapshot;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(get_table).put(upsert_snapshot))
}

pub async fn get_table(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let table = services.rates.read();
    let snapshots = table
        .snapshots()
        .iter()
        .map(|s| {
            serde_json::json!({
                "as_of": s.as_of,
                "rates": s
                    .rates()
                    .iter()
                    .map(|(c, r)| (c.as_str().to_string(), serde_json::json!(r)))
                    .collect::<serde_json::Map<String, serde_json::Value>>(),
            })
        })
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "snapshots": snapshots })),
    )
        .into_response()
}

/// Persist a snapshot and make it visible to conversions immediately.
pub async fn upsert_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RateSnapshotRequest>,
) -> axum::response::Response {
    let mut snapshot = RateSnapshot::new(body.as_of);
    for (code, rate) in &body.rates {
        let currency = match dto::parse_currency(code) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        if !rate.is_finite() || *rate <= 0.0 {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("rate for {code} must be positive and finite"),
            );
        }
        snapshot.set_rate(currency, *rate);
    }

    if let Err(e) = services.rate_store.upsert_snapshot(&snapshot).await {
        return errors::store_error_to_response(e);
    }
    services.rates.insert(snapshot);

    StatusCode::NO_CONTENT.into_response()
}
