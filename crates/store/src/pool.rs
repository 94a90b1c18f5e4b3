//! Connection pool setup.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::error::{StoreError, map_sqlx_error};

/// Connect to Postgres with a modest pool.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}
