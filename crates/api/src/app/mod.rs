//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: repository wiring over the connection pool and rate table
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use sqlx::PgPool;
use tower::ServiceBuilder;

use finbook_store::StoreError;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Loads the persisted exchange-rate table before serving, so conversions are
/// available from the first request.
pub async fn build_app(pool: PgPool, jwt_secret: String) -> Result<Router, StoreError> {
    let services = Arc::new(services::build_services(pool, &jwt_secret).await?);
    let auth_state = middleware::AuthState {
        jwt: services.jwt.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(services.clone()))
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            )),
    );

    Ok(Router::new()
        .route("/health", get(routes::system::health))
        .nest("/auth", routes::auth::router().layer(Extension(services)))
        .merge(protected))
}
