//! Distinct row count per operator kind.

use tracing::trace;

use crate::metadata::StatisticsProviderExt;
use crate::planner::cost::selectivity::{decay_distinct, filtered_ndv, num_distinct_vals};
use crate::planner::cost::CardinalityEstimator;
use crate::planner::logical::{and_all, ColumnSet, Expr, NodeId, NodeKind, PlanNode, ScanNode};
use crate::planner::PlanResult;

/// Conjuncts that can be rewritten onto an input, and the rest.
struct PushedPredicate {
    pushed: Option<Expr>,
    rest: Option<Expr>,
}

fn push_through(predicate: Option<&Expr>, map: &impl Fn(usize) -> Option<usize>) -> PushedPredicate {
    let (mut pushed, mut rest) = (Vec::new(), Vec::new());
    for conjunct in predicate.map(Expr::conjuncts).unwrap_or_default() {
        match conjunct.remap(map) {
            Some(mapped) => pushed.push(mapped),
            None => rest.push(conjunct.clone()),
        }
    }
    PushedPredicate {
        pushed: (!pushed.is_empty()).then(|| and_all(pushed)),
        rest: (!rest.is_empty()).then(|| and_all(rest)),
    }
}

impl<'a> CardinalityEstimator<'a> {
    pub(crate) fn compute_distinct_count(
        &self,
        node: &PlanNode,
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        if self.columns_unique(node.id, columns)? {
            let rows = self.row_count(node.id)? * self.selectivity(node, predicate)?;
            trace!(node = %node.id, %columns, rows, "columns form a key");
            return Ok(Some(rows));
        }

        match &node.kind {
            NodeKind::Scan(scan) => self.scan_distinct_count(node, scan, columns, predicate),
            NodeKind::Filter { condition } => {
                let combined = match predicate {
                    Some(p) => and_all([p.clone(), condition.clone()]),
                    None => condition.clone(),
                };
                self.distinct_count(node.input(0)?, columns, Some(&combined))
            }
            NodeKind::Project { exprs } => self.project_distinct_count(node, exprs, columns, predicate),
            NodeKind::Aggregate { group_set, .. } => {
                self.aggregate_distinct_count(node, group_set, columns, predicate)
            }
            NodeKind::Join {
                join_type,
                condition,
            } => self.join_distinct_count(node, *join_type, condition, columns, predicate),
            NodeKind::MultiJoin { .. } => self.decay(node, columns, predicate).map(Some),
            NodeKind::Window { .. } => {
                let input = node.input(0)?;
                let width = self.arena.node(input)?.width();
                let reads_input = |set: &ColumnSet| set.iter().all(|c| c < width);
                let predicate_columns = predicate.map(Expr::columns).unwrap_or_default();
                if reads_input(columns) && reads_input(&predicate_columns) {
                    self.distinct_count(input, columns, predicate)
                } else {
                    self.decay(node, columns, predicate).map(Some)
                }
            }
            NodeKind::Values { .. } => {
                let rows = self.row_count(node.id)?;
                let selectivity = self.selectivity(node, predicate)?;
                let population = rows / 2.0;
                Ok(Some(num_distinct_vals(population, population * selectivity)))
            }
            NodeKind::Flatten { flattened } => {
                let input = node.input(0)?;
                let touches_flattened = predicate
                    .map(|p| p.columns().iter().any(|c| flattened.contains(c)))
                    .unwrap_or(false);
                if touches_flattened {
                    let selectivity = self.selectivity(node, predicate)?;
                    Ok(self
                        .distinct_count(input, columns, None)?
                        .map(|ndv| ndv * selectivity))
                } else {
                    self.distinct_count(input, columns, predicate)
                }
            }
            NodeKind::Limit { fetch, .. } => Ok(self
                .distinct_count(node.input(0)?, columns, predicate)?
                .map(|ndv| match fetch {
                    Some(fetch) => ndv.min(*fetch as f64),
                    None => ndv,
                })),
            NodeKind::Sort
            | NodeKind::Exchange { .. }
            | NodeKind::BridgeReader
            | NodeKind::Subtree
            | NodeKind::Placeholder { .. }
            | NodeKind::Vertex => self.distinct_count(node.input(0)?, columns, predicate),
        }
    }

    /// `(1 − 0.9^n) × rows × selectivity` over this node's output.
    fn decay(&self, node: &PlanNode, columns: &ColumnSet, predicate: Option<&Expr>) -> PlanResult<f64> {
        let rows = self.row_count(node.id)?;
        let selectivity = self.selectivity(node, predicate)?;
        Ok(decay_distinct(columns.len(), rows, selectivity))
    }

    fn scan_distinct_count(
        &self,
        node: &PlanNode,
        scan: &ScanNode,
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        if !self.stats_enabled() {
            return self.decay(node, columns, predicate).map(Some);
        }
        let table = scan.table.name.as_str();
        let mut product = 1.0;
        for c in columns.iter() {
            let ndv = scan
                .column_name(c)
                .and_then(|name| self.stats.ndv_or_none(name, table));
            match ndv {
                Some(ndv) => product *= ndv as f64,
                None => return self.decay(node, columns, predicate).map(Some),
            }
        }

        let table_rows = self.stats.row_count_or_none(table).map(|n| n as f64);
        if let Some(rows) = table_rows {
            product = product.min(rows);
        }
        let reduction =
            self.scan_filter_reduction(node, scan)? * self.selectivity(node, predicate)?;
        Ok(Some(filtered_ndv(
            product,
            table_rows.unwrap_or(product),
            reduction,
        )))
    }

    fn aggregate_distinct_count(
        &self,
        node: &PlanNode,
        group_set: &ColumnSet,
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        if self.stats_enabled() {
            return self.decay(node, columns, predicate).map(Some);
        }
        let group_cols: Vec<usize> = group_set.iter().collect();
        let to_input = |c: usize| group_cols.get(c).copied();
        let split = push_through(predicate, &to_input);

        // aggregate-call columns are determined by the group
        let key: ColumnSet = columns.iter().filter_map(&to_input).collect();
        let key = key.union(group_set);
        let rest = self.selectivity(node, split.rest.as_ref())?;
        Ok(self
            .distinct_count(node.input(0)?, &key, split.pushed.as_ref())?
            .map(|ndv| ndv * rest))
    }

    fn project_distinct_count(
        &self,
        node: &PlanNode,
        exprs: &[Expr],
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        let input = node.input(0)?;
        let mut base = ColumnSet::new();
        let mut multiplier = 1.0;
        for c in columns.iter() {
            match exprs.get(c) {
                Some(Expr::Column(i)) => {
                    base.insert(*i);
                }
                Some(expr) => {
                    match self.expr_cardinality(input, expr)? {
                        Some(n) => multiplier *= n,
                        None => return Ok(None),
                    }
                }
                None => {}
            }
        }

        let split = push_through(predicate, &|c| exprs.get(c).and_then(Expr::as_column));
        let Some(ndv) = self.distinct_count(input, &base, split.pushed.as_ref())? else {
            return Ok(None);
        };
        let ndv = ndv * multiplier * self.selectivity(node, split.rest.as_ref())?;

        let normalized = num_distinct_vals(ndv, self.row_count(node.id)?);
        if normalized <= 0.0 {
            return self.decay(node, columns, predicate).map(Some);
        }
        Ok(Some(normalized))
    }

    /// How many distinct values a computed projection can take.
    fn expr_cardinality(&self, input: NodeId, expr: &Expr) -> PlanResult<Option<f64>> {
        match expr {
            Expr::Literal(_) => Ok(Some(1.0)),
            Expr::Case { branches, otherwise } => {
                let arms = branches.len() + usize::from(otherwise.is_some());
                Ok(Some(arms.max(1) as f64))
            }
            other => self.distinct_count(input, &other.columns(), None),
        }
    }
}
