//! Column-origin analysis: trace output columns back to base-table columns
//! and prove column sets unique.

use crate::planner::cost::join::JoinKeys;
use crate::planner::cost::CardinalityEstimator;
use crate::planner::logical::{ColumnSet, Expr, NodeId, NodeKind, PlanNode};
use crate::planner::PlanResult;

/// Bound on how far origin tracing walks; placeholders may form cycles.
const MAX_TRACE_DEPTH: usize = 64;

/// Base-table column an output column is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnOrigin {
    pub scan: NodeId,
    pub table: String,
    pub column: String,
}

impl<'a> CardinalityEstimator<'a> {
    /// Trace output column `ordinal` of `id` to the base-table column it
    /// carries unchanged. `None` when it is computed or cannot be traced.
    pub fn column_origin(&self, id: NodeId, ordinal: usize) -> PlanResult<Option<ColumnOrigin>> {
        let mut id = id;
        let mut ordinal = ordinal;
        for _ in 0..MAX_TRACE_DEPTH {
            let node = self.arena.node(id)?;
            let next = match &node.kind {
                NodeKind::Scan(scan) => {
                    return Ok(scan.column_name(ordinal).map(|column| ColumnOrigin {
                        scan: id,
                        table: scan.table.name.clone(),
                        column: column.to_string(),
                    }));
                }
                NodeKind::Values { .. } => return Ok(None),
                NodeKind::Filter { .. }
                | NodeKind::Sort
                | NodeKind::Limit { .. }
                | NodeKind::Exchange { .. }
                | NodeKind::BridgeReader
                | NodeKind::Subtree
                | NodeKind::Placeholder { .. }
                | NodeKind::Vertex => Some((node.input(0)?, ordinal)),
                NodeKind::Flatten { flattened } => {
                    (!flattened.contains(ordinal)).then_some((node.input(0)?, ordinal))
                }
                NodeKind::Project { exprs } => match exprs.get(ordinal) {
                    Some(Expr::Column(c)) => Some((node.input(0)?, *c)),
                    _ => None,
                },
                NodeKind::Aggregate { group_set, .. } => group_set
                    .iter()
                    .nth(ordinal)
                    .map(|c| Ok::<_, crate::planner::PlanError>((node.input(0)?, c)))
                    .transpose()?,
                NodeKind::Window { .. } => {
                    let input = node.input(0)?;
                    (ordinal < self.arena.node(input)?.width()).then_some((input, ordinal))
                }
                NodeKind::Join { .. } | NodeKind::MultiJoin { .. } => {
                    self.locate_input(node, ordinal)?
                }
            };
            match next {
                Some((input, input_ordinal)) => {
                    id = input;
                    ordinal = input_ordinal;
                }
                None => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Input carrying output `ordinal` of a join-like node, and the ordinal
    /// within that input.
    pub(crate) fn locate_input(
        &self,
        node: &PlanNode,
        ordinal: usize,
    ) -> PlanResult<Option<(NodeId, usize)>> {
        let mut offset = 0;
        for input in &node.inputs {
            let width = self.arena.node(*input)?.width();
            if ordinal < offset + width {
                return Ok(Some((*input, ordinal - offset)));
            }
            offset += width;
        }
        Ok(None)
    }

    /// Base table every listed column traces to, if they all agree.
    pub fn common_table(&self, id: NodeId, columns: &[usize]) -> PlanResult<Option<String>> {
        let mut table: Option<String> = None;
        for &c in columns {
            let Some(origin) = self.column_origin(id, c)? else {
                return Ok(None);
            };
            match &table {
                Some(t) if *t != origin.table => return Ok(None),
                Some(_) => {}
                None => table = Some(origin.table),
            }
        }
        Ok(table)
    }

    /// True if no two output rows of `id` agree on all of `columns`.
    ///
    /// Proven by covering a declared table key through nodes that never
    /// duplicate rows, or by covering an aggregate's full group set.
    pub fn columns_unique(&self, id: NodeId, columns: &ColumnSet) -> PlanResult<bool> {
        self.columns_unique_at(id, columns, 0)
    }

    fn columns_unique_at(&self, id: NodeId, columns: &ColumnSet, depth: usize) -> PlanResult<bool> {
        if columns.is_empty() || depth >= MAX_TRACE_DEPTH {
            return Ok(false);
        }
        let node = self.arena.node(id)?;
        match &node.kind {
            NodeKind::Scan(scan) => {
                let names: Vec<&str> = columns.iter().filter_map(|c| scan.column_name(c)).collect();
                Ok(scan
                    .table
                    .unique_keys
                    .iter()
                    .any(|key| !key.is_empty() && key.iter().all(|k| names.contains(&k.as_str()))))
            }
            NodeKind::Filter { .. }
            | NodeKind::Sort
            | NodeKind::Limit { .. }
            | NodeKind::Exchange { .. }
            | NodeKind::BridgeReader
            | NodeKind::Subtree
            | NodeKind::Placeholder { .. }
            | NodeKind::Vertex => self.columns_unique_at(node.input(0)?, columns, depth + 1),
            NodeKind::Project { exprs } => {
                let mapped: ColumnSet = columns
                    .iter()
                    .filter_map(|c| exprs.get(c).and_then(Expr::as_column))
                    .collect();
                self.columns_unique_at(node.input(0)?, &mapped, depth + 1)
            }
            NodeKind::Aggregate {
                group_set,
                grouping_sets,
                ..
            } => {
                if grouping_sets.len() > 1 {
                    return Ok(false);
                }
                let group_count = group_set.len();
                if ColumnSet::range(group_count).is_subset(columns) {
                    return Ok(true);
                }
                let group_cols: Vec<usize> = group_set.iter().collect();
                let mapped: ColumnSet = columns
                    .iter()
                    .filter_map(|c| group_cols.get(c).copied())
                    .collect();
                self.columns_unique_at(node.input(0)?, &mapped, depth + 1)
            }
            NodeKind::Window { .. } => {
                let input = node.input(0)?;
                let width = self.arena.node(input)?.width();
                self.columns_unique_at(input, &columns.below(width), depth + 1)
            }
            NodeKind::Join { condition, .. } => {
                let left = node.input(0)?;
                let right = node.input(1)?;
                let left_width = self.arena.node(left)?.width();
                let keys = JoinKeys::split(condition, left_width);
                if keys.is_empty() {
                    return Ok(false);
                }
                // A side stays unique when each of its rows meets at most one
                // row of the other side.
                let left_cols = columns.below(left_width);
                let right_cols = columns.from_offset(left_width);
                if self.columns_unique_at(left, &left_cols, depth + 1)?
                    && self.columns_unique_at(right, &keys.right_set(), depth + 1)?
                {
                    return Ok(true);
                }
                Ok(self.columns_unique_at(right, &right_cols, depth + 1)?
                    && self.columns_unique_at(left, &keys.left_set(), depth + 1)?)
            }
            NodeKind::MultiJoin { .. } | NodeKind::Values { .. } | NodeKind::Flatten { .. } => {
                Ok(false)
            }
        }
    }
}
