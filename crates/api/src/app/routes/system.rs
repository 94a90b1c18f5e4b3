use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::OwnerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<OwnerContext>,
) -> axum::response::Response {
    match services.users.get(ctx.owner()).await {
        Ok(user) => Json(serde_json::json!({
            "user_id": user.id().to_string(),
            "email": user.email,
            "display_name": user.display_name,
        }))
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
