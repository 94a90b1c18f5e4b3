//! Rate provider abstraction.
//!
//! Conversion call sites depend on this trait rather than a module-level
//! singleton, so tests can inject fixed snapshots and stay deterministic.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::error::FxError;
use crate::table::{RateSnapshot, RateTable};

/// Source of point-in-time rate snapshots.
pub trait RateProvider: Send + Sync {
    /// The snapshot nearest to `at` (nearest-neighbor, no interpolation).
    fn snapshot_at(&self, at: DateTime<Utc>) -> Result<RateSnapshot, FxError>;
}

impl RateProvider for RateTable {
    fn snapshot_at(&self, at: DateTime<Utc>) -> Result<RateSnapshot, FxError> {
        self.nearest(at).cloned()
    }
}

/// Process-wide rate table behind a lock.
///
/// Reads clone the resolved snapshot, so conversions never hold the lock across
/// arithmetic; the refresh path swaps or appends under the write lock.
#[derive(Debug, Clone, Default)]
pub struct SharedRateTable {
    inner: Arc<RwLock<RateTable>>,
}

impl SharedRateTable {
    pub fn new(table: RateTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    pub fn insert(&self, snapshot: RateSnapshot) {
        let mut guard = self.inner.write().expect("rate table lock poisoned");
        guard.insert(snapshot);
    }

    pub fn replace(&self, table: RateTable) {
        let mut guard = self.inner.write().expect("rate table lock poisoned");
        *guard = table;
    }

    pub fn read(&self) -> RateTable {
        self.inner.read().expect("rate table lock poisoned").clone()
    }
}

impl RateProvider for SharedRateTable {
    fn snapshot_at(&self, at: DateTime<Utc>) -> Result<RateSnapshot, FxError> {
        let guard = self.inner.read().expect("rate table lock poisoned");
        guard.nearest(at).cloned()
    }
}
