//! Registration and login. The only routes that run without an owner context.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::{Duration, Utc};

use finbook_auth::{hash_password, verify_password};
use finbook_store::NewUser;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

const TOKEN_TTL_HOURS: i64 = 24;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterRequest>,
) -> axum::response::Response {
    if !body.email.contains('@') {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "email is not valid",
        );
    }
    if body.password.len() < 8 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "password must be at least 8 characters",
        );
    }
    if body.display_name.trim().is_empty() {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "display name must not be empty",
        );
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "password hashing failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "hash_error",
                "failed to process password",
            );
        }
    };

    let user = match services
        .users
        .create(NewUser {
            email: body.email,
            display_name: body.display_name.trim().to_string(),
            password_hash,
        })
        .await
    {
        Ok(u) => u,
        Err(e) => return errors::store_error_to_response(e),
    };

    issue_token_response(&services, user, StatusCode::CREATED)
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> axum::response::Response {
    let user = match services.users.find_by_email(&body.email).await {
        Ok(Some(u)) => u,
        // Unknown email and wrong password are indistinguishable.
        Ok(None) => return invalid_credentials(),
        Err(e) => return errors::store_error_to_response(e),
    };

    if verify_password(&body.password, &user.password_hash).is_err() {
        return invalid_credentials();
    }

    issue_token_response(&services, user, StatusCode::OK)
}

fn invalid_credentials() -> axum::response::Response {
    errors::json_error(
        StatusCode::UNAUTHORIZED,
        "invalid_credentials",
        "invalid email or password",
    )
}

fn issue_token_response(
    services: &AppServices,
    user: finbook_store::UserRecord,
    status: StatusCode,
) -> axum::response::Response {
    let token = match services
        .jwt
        .issue(user.id(), Utc::now(), Duration::hours(TOKEN_TTL_HOURS))
    {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "token signing failed");
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                "failed to issue token",
            );
        }
    };

    (
        status,
        Json(serde_json::json!({
            "token": token,
            "user": {
                "user_id": user.id().to_string(),
                "email": user.email,
                "display_name": user.display_name,
            },
        })),
    )
        .into_response()
}
