use axum::{Router, routing::get};

pub mod accounts;
pub mod auth;
pub mod borrowings;
pub mod dashboard;
pub mod rates;
pub mod shifts;
pub mod system;
pub mod transactions;

/// Router for all authenticated (owner-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounts", accounts::router())
        .nest("/transactions", transactions::router())
        .nest("/borrowings", borrowings::router())
        .nest("/shifts", shifts::router())
        .nest("/rates", rates::router())
        .nest("/dashboard", dashboard::router())
}
