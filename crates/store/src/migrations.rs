//! Versioned migration runner.
//!
//! Each migration is applied at most once, in order, inside its own SQL
//! transaction, keyed on a `schema_migrations` table. Migrations are embedded
//! in the binary so a deployed service can always bring its schema up to date.

use sqlx::PgPool;

use crate::error::{StoreError, map_sqlx_error};

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_initial", include_str!("migrations/0001_initial.sql")),
    (
        "0002_minor_units_backfill",
        include_str!("migrations/0002_minor_units_backfill.sql"),
    ),
];

/// Apply all pending migrations.
pub async fn run(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            name TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("migrations.init", e))?;

    for (name, sql) in MIGRATIONS {
        let applied = sqlx::query("SELECT name FROM schema_migrations WHERE name = $1")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx_error("migrations.check", e))?;

        if applied.is_some() {
            continue;
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("migrations.begin", e))?;

        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrations.apply", e))?;

        sqlx::query("INSERT INTO schema_migrations(name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("migrations.record", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("migrations.commit", e))?;

        tracing::info!(migration = name, "applied migration");
    }

    Ok(())
}
