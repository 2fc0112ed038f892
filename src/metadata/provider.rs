//! StatisticsProvider trait definition.
//!
//! The StatisticsProvider trait abstracts over where table statistics come
//! from. The estimators only ever read through it; collection and refresh
//! belong to whoever implements it.

use tracing::debug;

use super::types::StatisticsResult;

/// Trait for reading table statistics.
///
/// Lookups are expected to be fast and local. "Not found" is `Ok(None)`;
/// `Err` is reserved for backend failures.
pub trait StatisticsProvider: Send + Sync {
    /// False for the no-op provider. Estimators branch on this to pick
    /// heuristic-only paths instead of issuing lookups that always miss.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Row count of `table`.
    fn get_row_count(&self, table: &str) -> StatisticsResult<Option<u64>>;

    /// Distinct-value count of `column` in `table`.
    fn get_ndv(&self, column: &str, table: &str) -> StatisticsResult<Option<u64>>;
}

/// Extension trait turning backend failures into "unavailable".
pub trait StatisticsProviderExt: StatisticsProvider {
    /// Row count, or `None` when unknown or the backend failed.
    fn row_count_or_none(&self, table: &str) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        match self.get_row_count(table) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(table, error = %e, "row count lookup failed; treating as unavailable");
                None
            }
        }
    }

    /// NDV, or `None` when unknown or the backend failed.
    fn ndv_or_none(&self, column: &str, table: &str) -> Option<u64> {
        if !self.is_enabled() {
            return None;
        }
        match self.get_ndv(column, table) {
            Ok(ndv) => ndv,
            Err(e) => {
                debug!(table, column, error = %e, "ndv lookup failed; treating as unavailable");
                None
            }
        }
    }
}

// Blanket implementation for all StatisticsProvider implementations
impl<T: StatisticsProvider + ?Sized> StatisticsProviderExt for T {}

/// Statistics disabled: every lookup reports "unavailable".
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStatistics;

impl StatisticsProvider for DisabledStatistics {
    fn is_enabled(&self) -> bool {
        false
    }

    fn get_row_count(&self, _table: &str) -> StatisticsResult<Option<u64>> {
        Ok(None)
    }

    fn get_ndv(&self, _column: &str, _table: &str) -> StatisticsResult<Option<u64>> {
        Ok(None)
    }
}
