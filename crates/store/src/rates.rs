//! Exchange-rate snapshot persistence.
//!
//! Snapshots live in `fx_rates` as one row per (as_of, currency). The service
//! loads the whole table into memory at startup; refreshes go through
//! [`RateStore::upsert_snapshot`] and then replace the in-memory table.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::instrument;

use finbook_core::Currency;
use finbook_fx::{RateSnapshot, RateTable};

use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, FromRow)]
struct RateRow {
    as_of: DateTime<Utc>,
    currency: String,
    rate: f64,
}

#[derive(Debug, Clone)]
pub struct RateStore {
    pool: PgPool,
}

impl RateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every persisted snapshot into a fresh [`RateTable`].
    ///
    /// Rows with currencies this build does not know are skipped with a
    /// warning rather than failing startup.
    #[instrument(skip(self), err)]
    pub async fn load(&self) -> Result<RateTable, StoreError> {
        let rows = sqlx::query_as::<_, RateRow>(
            "SELECT as_of, currency, rate FROM fx_rates ORDER BY as_of, currency",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("rates.load", e))?;

        let mut table = RateTable::new();
        let mut current: Option<RateSnapshot> = None;
        for row in rows {
            let currency = match row.currency.parse::<Currency>() {
                Ok(c) => c,
                Err(_) => {
                    tracing::warn!(currency = %row.currency, "skipping unknown currency rate");
                    continue;
                }
            };
            if current.as_ref().map(|s| s.as_of) != Some(row.as_of) {
                if let Some(done) = current.take() {
                    table.insert(done);
                }
                current = Some(RateSnapshot::new(row.as_of));
            }
            if let Some(snapshot) = current.as_mut() {
                snapshot.set_rate(currency, row.rate);
            }
        }
        if let Some(done) = current {
            table.insert(done);
        }

        tracing::info!(snapshots = table.len(), "loaded exchange-rate table");
        Ok(table)
    }

    /// Persist a snapshot, overwriting any existing rates at the same `as_of`.
    #[instrument(skip(self, snapshot), fields(as_of = %snapshot.as_of), err)]
    pub async fn upsert_snapshot(&self, snapshot: &RateSnapshot) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("rates.upsert.begin", e))?;

        for (currency, rate) in snapshot.rates() {
            sqlx::query(
                r#"
                INSERT INTO fx_rates (as_of, currency, rate)
                VALUES ($1, $2, $3)
                ON CONFLICT (as_of, currency) DO UPDATE SET rate = EXCLUDED.rate
                "#,
            )
            .bind(snapshot.as_of)
            .bind(currency.as_str())
            .bind(rate)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("rates.upsert", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("rates.upsert.commit", e))?;
        Ok(())
    }
}
