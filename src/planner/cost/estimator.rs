//! Estimator entry points and the cache protocol around them.

use tracing::{debug, trace};

use crate::cache::{CachedValue, QueryDescriptor};
use crate::config::CostModelConfig;
use crate::metadata::StatisticsProvider;
use crate::planner::cost::selectivity::sanitize;
use crate::planner::logical::{is_trivial, ColumnSet, Expr, NodeId, PlanArena, PlanNode};
use crate::planner::{PlanResult, PlanningSession};

/// Estimates row counts and distinct counts for nodes of one plan arena.
///
/// Stateless apart from the session cache; cheap to construct per lookup.
pub struct CardinalityEstimator<'a> {
    pub(crate) arena: &'a PlanArena,
    pub(crate) session: &'a PlanningSession,
    pub(crate) stats: &'a dyn StatisticsProvider,
}

impl<'a> CardinalityEstimator<'a> {
    pub fn new(
        arena: &'a PlanArena,
        session: &'a PlanningSession,
        stats: &'a dyn StatisticsProvider,
    ) -> Self {
        Self {
            arena,
            session,
            stats,
        }
    }

    pub fn arena(&self) -> &PlanArena {
        self.arena
    }

    pub fn config(&self) -> &CostModelConfig {
        self.session.config()
    }

    /// False selects the heuristic-only paths.
    pub fn stats_enabled(&self) -> bool {
        self.stats.is_enabled()
    }

    /// Estimated output rows of `id`. Never negative.
    pub fn row_count(&self, id: NodeId) -> PlanResult<f64> {
        let node = self.arena.node(id)?;
        let cache = self.session.cache();
        let descriptor = QueryDescriptor::RowCount;

        match cache.get(node, &descriptor) {
            CachedValue::Value(rows) => return Ok(rows),
            CachedValue::InProgress => {
                trace!(node = %id, kind = node.kind.name(), "row count cycle; using fallback");
                return Ok(self.fallback_row_count(node));
            }
            CachedValue::NotComputed => {}
        }

        cache.put(node, descriptor.clone(), CachedValue::InProgress)?;
        let rows = sanitize(self.compute_row_count(node)?);
        cache.put(node, descriptor, CachedValue::Value(rows))?;
        debug!(node = %id, kind = node.kind.name(), rows, "estimated row count");
        Ok(rows)
    }

    /// Estimated number of distinct values of `columns` over the rows of
    /// `id` satisfying `predicate`. `None` means no estimate; callers fall
    /// back to their own default.
    pub fn distinct_count(
        &self,
        id: NodeId,
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        let node = self.arena.node(id)?;
        let predicate = if is_trivial(predicate) {
            None
        } else {
            predicate
        };

        if columns.is_empty() {
            if predicate.is_none() {
                return Ok(Some(1.0));
            }
            let rows = self.row_count(id)? * self.selectivity(node, predicate)?;
            return Ok(Some(rows.min(1.0)));
        }

        let cache = self.session.cache();
        let descriptor = QueryDescriptor::distinct_count(columns, predicate);
        match cache.get(node, &descriptor) {
            CachedValue::Value(ndv) => return Ok(Some(ndv)),
            CachedValue::InProgress => {
                trace!(node = %id, kind = node.kind.name(), %columns, "distinct count cycle");
                return Ok(None);
            }
            CachedValue::NotComputed => {}
        }

        cache.put(node, descriptor.clone(), CachedValue::InProgress)?;
        let estimate = match self.compute_distinct_count(node, columns, predicate)? {
            Some(ndv) => {
                let rows = self.row_count(id)?;
                Some(sanitize(ndv).min(rows))
            }
            None => None,
        };
        match estimate {
            Some(ndv) => {
                cache.put(node, descriptor, CachedValue::Value(ndv))?;
                debug!(node = %id, kind = node.kind.name(), %columns, ndv, "estimated distinct count");
            }
            // a wrapper keeps its marker otherwise; the cycle may be gone next time
            None => {
                cache.forget(node, &descriptor);
            }
        }
        Ok(estimate)
    }

    /// Answer for a node caught mid-computation.
    fn fallback_row_count(&self, node: &PlanNode) -> f64 {
        node.row_count_hint
            .unwrap_or(self.config().default_row_count)
    }
}
