//! Row count per operator kind.

use tracing::trace;

use crate::metadata::StatisticsProviderExt;
use crate::planner::cost::join::generic_join_rows;
use crate::planner::cost::selectivity::guess_selectivity;
use crate::planner::cost::CardinalityEstimator;
use crate::planner::logical::{
    AggPhase, ColumnSet, Expr, NodeKind, PartitionPruning, PlanNode, ScanNode,
};
use crate::planner::PlanResult;

impl<'a> CardinalityEstimator<'a> {
    pub(crate) fn compute_row_count(&self, node: &PlanNode) -> PlanResult<f64> {
        match &node.kind {
            NodeKind::Scan(scan) => self.scan_row_count(node, scan),
            NodeKind::Project { .. } => self.row_count(node.input(0)?),
            NodeKind::Aggregate {
                group_set,
                grouping_sets,
                phase,
                ..
            } => self.aggregate_row_count(node, group_set, grouping_sets, *phase),
            NodeKind::Join {
                join_type,
                condition,
            } => self.join_row_count(node, *join_type, condition),
            NodeKind::MultiJoin { conditions } => self.multi_join_row_count(node, conditions),
            NodeKind::Filter { .. }
            | NodeKind::Window { .. }
            | NodeKind::Values { .. }
            | NodeKind::Flatten { .. }
            | NodeKind::Sort
            | NodeKind::Limit { .. }
            | NodeKind::Exchange { .. }
            | NodeKind::BridgeReader
            | NodeKind::Subtree
            | NodeKind::Placeholder { .. }
            | NodeKind::Vertex => self.self_estimate(node),
        }
    }

    /// The node's own estimate: its hint when set, otherwise a per-kind
    /// default that never consults statistics directly.
    pub fn self_estimate(&self, node: &PlanNode) -> PlanResult<f64> {
        if let Some(hint) = node.row_count_hint {
            return Ok(hint);
        }
        match &node.kind {
            NodeKind::Scan(scan) => {
                let declared = scan
                    .declared_row_count
                    .unwrap_or(self.config().default_row_count);
                Ok(declared * self.scan_filter_reduction(node, scan)?)
            }
            NodeKind::Filter { condition } => {
                Ok(self.row_count(node.input(0)?)? * guess_selectivity(Some(condition)))
            }
            NodeKind::Aggregate { group_set, .. } => {
                if group_set.is_empty() {
                    return Ok(1.0);
                }
                let input = self.row_count(node.input(0)?)?;
                Ok(input * (1.0 - 0.5f64.powi(group_set.len() as i32)))
            }
            NodeKind::Join {
                join_type,
                condition,
            } => {
                let left = self.row_count(node.input(0)?)?;
                let right = self.row_count(node.input(1)?)?;
                Ok(generic_join_rows(
                    left,
                    right,
                    guess_selectivity(Some(condition)),
                    *join_type,
                ))
            }
            NodeKind::MultiJoin { conditions } => self.multi_join_row_count(node, conditions),
            NodeKind::Limit { offset, fetch } => {
                let input = self.row_count(node.input(0)?)?;
                let available = (input - *offset as f64).max(0.0);
                Ok(match fetch {
                    Some(fetch) => available.min(*fetch as f64),
                    None => available,
                })
            }
            NodeKind::Values { tuples } => Ok(tuples.len() as f64),
            NodeKind::Project { .. }
            | NodeKind::Window { .. }
            | NodeKind::Flatten { .. }
            | NodeKind::Sort
            | NodeKind::Exchange { .. }
            | NodeKind::BridgeReader
            | NodeKind::Subtree
            | NodeKind::Placeholder { .. }
            | NodeKind::Vertex => self.row_count(node.input(0)?),
        }
    }

    fn scan_row_count(&self, node: &PlanNode, scan: &ScanNode) -> PlanResult<f64> {
        let Some(table_rows) = self.stats.row_count_or_none(&scan.table.name) else {
            return self.self_estimate(node);
        };
        let cfg = self.config();
        let mut rows = table_rows as f64 * self.scan_filter_reduction(node, scan)?;
        rows *= scan.split_ratio;
        if scan.partition_pruning == PartitionPruning::Unmeasured {
            rows *= cfg.partition_filter_factor;
        }
        rows *= scan.observed_adjustment.unwrap_or(1.0);
        Ok(rows)
    }

    /// Fraction of rows surviving a scan's embedded filter, discounted when
    /// the filter only approximates the original predicate.
    pub fn scan_filter_reduction(&self, node: &PlanNode, scan: &ScanNode) -> PlanResult<f64> {
        let Some(filter) = &scan.filter else {
            return Ok(1.0);
        };
        let mut reduction = self.selectivity(node, Some(&filter.predicate))?;
        if !filter.exact {
            reduction *= self.config().inexact_filter_factor;
        }
        Ok(reduction)
    }

    fn aggregate_row_count(
        &self,
        node: &PlanNode,
        group_set: &ColumnSet,
        grouping_sets: &[ColumnSet],
        phase: AggPhase,
    ) -> PlanResult<f64> {
        let input = node.input(0)?;
        if phase == AggPhase::Final {
            return self.row_count(input);
        }
        if group_set.is_empty() && !self.stats_enabled() {
            return Ok(1.0);
        }
        let Some(groups) = self.distinct_count(input, group_set, None)? else {
            return self.self_estimate(node);
        };
        let input_rows = self.row_count(input)?;
        let rows = groups * grouping_sets.len().max(1) as f64;
        if rows >= self.config().aggregate_upper_bound_factor * input_rows {
            trace!(node = %node.id, rows, input_rows, "aggregate estimate not reducing; using default");
            return self.self_estimate(node);
        }
        Ok(rows)
    }

    /// A cross product when nothing restricts it, otherwise the largest input.
    fn multi_join_row_count(&self, node: &PlanNode, conditions: &[Expr]) -> PlanResult<f64> {
        let cross = conditions.iter().all(Expr::is_always_true);
        let mut rows = if cross { 1.0 } else { 0.0f64 };
        for input in &node.inputs {
            let input_rows = self.row_count(*input)?;
            rows = if cross {
                rows * input_rows
            } else {
                rows.max(input_rows)
            };
        }
        Ok(rows)
    }
}
