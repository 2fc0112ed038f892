//! Join cardinality: equi-key analysis, row-count formulas and distinct-count
//! propagation across equality conditions.
//!
//! Row-count paths, in order of preference:
//!
//! ```text
//! statistics enabled:   semi-join (INNER) -> classical NDV (key NDVs known)
//!                       -> generic product (row counts known)
//!                       -> foreign-key heuristic
//! statistics disabled:  foreign-key heuristic (self-join factor, RIGHT penalty)
//! ```

use std::collections::BTreeSet;

use petgraph::unionfind::UnionFind;
use tracing::trace;

use crate::metadata::StatisticsProviderExt;
use crate::planner::cost::selectivity::guess_selectivity;
use crate::planner::cost::CardinalityEstimator;
use crate::planner::logical::{
    and_all, BinaryOp, ColumnSet, Expr, JoinType, NodeId, NodeKind, PlanNode,
};
use crate::planner::PlanResult;

/// A join condition split into equi-key pairs and whatever is left over.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinKeys {
    /// `(left ordinal, right ordinal)`; right ordinals are relative to the
    /// right input.
    pub pairs: Vec<(usize, usize)>,
    /// Remaining conjuncts over the join's output ordinals.
    pub residual: Option<Expr>,
}

impl JoinKeys {
    pub fn split(condition: &Expr, left_width: usize) -> Self {
        let mut pairs = Vec::new();
        let mut rest = Vec::new();
        for conjunct in condition.conjuncts() {
            match equi_pair(conjunct, left_width) {
                Some(pair) => pairs.push(pair),
                None => rest.push(conjunct.clone()),
            }
        }
        let residual = (!rest.is_empty()).then(|| and_all(rest));
        Self { pairs, residual }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn left_set(&self) -> ColumnSet {
        self.pairs.iter().map(|(l, _)| *l).collect()
    }

    pub fn right_set(&self) -> ColumnSet {
        self.pairs.iter().map(|(_, r)| *r).collect()
    }

    pub fn residual(&self) -> Option<&Expr> {
        self.residual.as_ref()
    }
}

fn equi_pair(conjunct: &Expr, left_width: usize) -> Option<(usize, usize)> {
    let Expr::Binary {
        op: BinaryOp::Eq,
        left,
        right,
    } = conjunct
    else {
        return None;
    };
    let (a, b) = (left.as_column()?, right.as_column()?);
    match (a < left_width, b < left_width) {
        (true, false) => Some((a, b - left_width)),
        (false, true) => Some((b, a - left_width)),
        _ => None,
    }
}

/// Product formula with outer-join adjustments. Overestimates on purpose.
pub(crate) fn generic_join_rows(left: f64, right: f64, selectivity: f64, join_type: JoinType) -> f64 {
    let inner = left * right * selectivity;
    match join_type {
        JoinType::Inner => inner,
        JoinType::Left => left * (1.0 - selectivity) + inner,
        JoinType::Right => right * (1.0 - selectivity) + inner,
        JoinType::Full => (left + right) * (1.0 - selectivity) + inner,
    }
}

/// Predicate over a join's output split by the side it reads.
struct SidePredicates {
    left: Option<Expr>,
    right: Option<Expr>,
    residual: Option<Expr>,
}

fn split_by_side(predicate: Option<&Expr>, left_width: usize) -> SidePredicates {
    let (mut left, mut right, mut residual) = (Vec::new(), Vec::new(), Vec::new());
    for conjunct in predicate.map(Expr::conjuncts).unwrap_or_default() {
        let columns = conjunct.columns();
        if columns.iter().all(|c| c < left_width) {
            left.push(conjunct.clone());
        } else if columns.iter().all(|c| c >= left_width) {
            match conjunct.shift_down(left_width) {
                Some(shifted) => right.push(shifted),
                None => residual.push(conjunct.clone()),
            }
        } else {
            residual.push(conjunct.clone());
        }
    }
    let combine = |v: Vec<Expr>| (!v.is_empty()).then(|| and_all(v));
    SidePredicates {
        left: combine(left),
        right: combine(right),
        residual: combine(residual),
    }
}

impl<'a> CardinalityEstimator<'a> {
    pub(crate) fn join_row_count(
        &self,
        node: &PlanNode,
        join_type: JoinType,
        condition: &Expr,
    ) -> PlanResult<f64> {
        let left = node.input(0)?;
        let right = node.input(1)?;
        let left_rows = self.row_count(left)?;
        let right_rows = self.row_count(right)?;
        let keys = JoinKeys::split(condition, self.arena.node(left)?.width());

        if !self.stats_enabled() {
            return self.foreign_key_row_count(node, join_type, condition, &keys, left_rows, right_rows);
        }

        if join_type == JoinType::Inner && self.config().semi_join_costing {
            if let Some(rows) = self.semi_join_row_count(node, &keys, left_rows, right_rows)? {
                trace!(node = %node.id, rows, "join estimated by semi-join costing");
                return Ok(rows);
            }
        }
        if self.keys_have_ndv(left, &keys.left_set())?
            && self.keys_have_ndv(right, &keys.right_set())?
        {
            if let Some(rows) =
                self.classical_row_count(node, join_type, &keys, left_rows, right_rows)?
            {
                trace!(node = %node.id, rows, "join estimated from key NDVs");
                return Ok(rows);
            }
        }
        if self.row_counts_measured(left)? && self.row_counts_measured(right)? {
            let selectivity = self.selectivity(node, Some(condition))?;
            return Ok(generic_join_rows(left_rows, right_rows, selectivity, join_type));
        }
        self.foreign_key_row_count(node, join_type, condition, &keys, left_rows, right_rows)
    }

    /// True when every key column traces to a base column whose NDV the
    /// statistics provider knows.
    fn keys_have_ndv(&self, input: NodeId, keys: &ColumnSet) -> PlanResult<bool> {
        if keys.is_empty() {
            return Ok(false);
        }
        for c in keys.iter() {
            let Some(origin) = self.column_origin(input, c)? else {
                return Ok(false);
            };
            if self.stats.ndv_or_none(&origin.column, &origin.table).is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// True when every table scanned below `id` has a row count in the
    /// statistics provider.
    fn row_counts_measured(&self, id: NodeId) -> PlanResult<bool> {
        let mut seen = BTreeSet::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if !seen.insert(next) {
                continue;
            }
            let node = self.arena.node(next)?;
            if let NodeKind::Scan(scan) = &node.kind {
                if self.stats.row_count_or_none(&scan.table.name).is_none() {
                    return Ok(false);
                }
            }
            pending.extend(node.inputs.iter().copied());
        }
        Ok(true)
    }

    /// The smaller side acts as a dimension whose key each larger-side row
    /// matches at most once.
    fn semi_join_row_count(
        &self,
        node: &PlanNode,
        keys: &JoinKeys,
        left_rows: f64,
        right_rows: f64,
    ) -> PlanResult<Option<f64>> {
        if keys.is_empty() {
            return Ok(None);
        }
        let (dimension, dimension_keys, fact_rows) = if right_rows <= left_rows {
            (node.input(1)?, keys.right_set(), left_rows)
        } else {
            (node.input(0)?, keys.left_set(), right_rows)
        };
        if !self.columns_unique(dimension, &dimension_keys)? {
            return Ok(None);
        }
        let ordinals: Vec<usize> = dimension_keys.iter().collect();
        let Some(table) = self.common_table(dimension, &ordinals)? else {
            return Ok(None);
        };
        let Some(population) = self.stats.row_count_or_none(&table).filter(|n| *n > 0) else {
            return Ok(None);
        };
        let Some(dimension_ndv) = self.distinct_count(dimension, &dimension_keys, None)? else {
            return Ok(None);
        };

        let floor = self.config().join_selectivity_floor;
        let fraction = (dimension_ndv / population as f64).min(1.0);
        let residual = self.selectivity(node, keys.residual())?;
        Ok(Some(fact_rows * (floor + fraction * residual * (1.0 - floor))))
    }

    fn classical_row_count(
        &self,
        node: &PlanNode,
        join_type: JoinType,
        keys: &JoinKeys,
        left_rows: f64,
        right_rows: f64,
    ) -> PlanResult<Option<f64>> {
        if keys.is_empty() {
            return Ok(None);
        }
        let left_ndv = self.distinct_count(node.input(0)?, &keys.left_set(), None)?;
        let right_ndv = self.distinct_count(node.input(1)?, &keys.right_set(), None)?;
        let (Some(left_ndv), Some(right_ndv)) = (left_ndv, right_ndv) else {
            return Ok(None);
        };
        if left_ndv <= 0.0 || right_ndv <= 0.0 {
            return Ok(None);
        }

        let min_ndv = left_ndv.min(right_ndv);
        let residual = self.selectivity(node, keys.residual())?;
        let inner = min_ndv * left_rows * right_rows / (left_ndv * right_ndv) * residual;
        let left_unmatched = (1.0 - (min_ndv / left_ndv) * residual) * left_rows;
        let right_unmatched = (1.0 - (min_ndv / right_ndv) * residual) * right_rows;

        Ok(Some(match join_type {
            JoinType::Inner => inner,
            JoinType::Left => inner + left_unmatched,
            JoinType::Right => inner + right_unmatched,
            JoinType::Full => inner + left_unmatched + right_unmatched,
        }))
    }

    /// Assume every unmeasurable join is key to foreign key.
    fn foreign_key_row_count(
        &self,
        node: &PlanNode,
        join_type: JoinType,
        condition: &Expr,
        keys: &JoinKeys,
        left_rows: f64,
        right_rows: f64,
    ) -> PlanResult<f64> {
        let cfg = self.config();
        let larger = left_rows.max(right_rows);

        let rows = if condition.is_always_true() {
            match join_type {
                JoinType::Right => larger * cfg.right_join_penalty,
                _ => larger,
            }
        } else if self.is_self_join(node, keys)? {
            larger * cfg.self_join_factor
        } else {
            let residual = guess_selectivity(keys.residual());
            larger * residual.clamp(cfg.join_selectivity_floor, cfg.join_selectivity_ceiling)
        };

        Ok(match join_type {
            JoinType::Inner => rows,
            JoinType::Left => rows.max(left_rows),
            JoinType::Right => rows.max(right_rows),
            JoinType::Full => rows.max(larger),
        })
    }

    /// True when every equi-key pair reads the same base table on both sides.
    pub fn is_self_join(&self, node: &PlanNode, keys: &JoinKeys) -> PlanResult<bool> {
        if keys.is_empty() {
            return Ok(false);
        }
        let left = node.input(0)?;
        let right = node.input(1)?;
        let mut table: Option<String> = None;
        for (l, r) in &keys.pairs {
            let (Some(lo), Some(ro)) = (self.column_origin(left, *l)?, self.column_origin(right, *r)?)
            else {
                return Ok(false);
            };
            if lo.table != ro.table || table.as_ref().is_some_and(|t| *t != lo.table) {
                return Ok(false);
            }
            table = Some(lo.table);
        }
        Ok(true)
    }

    /// Distinct count over a join: columns tied by an inner equality take
    /// the smallest NDV among their class, independent groups multiply.
    pub(crate) fn join_distinct_count(
        &self,
        node: &PlanNode,
        join_type: JoinType,
        condition: &Expr,
        columns: &ColumnSet,
        predicate: Option<&Expr>,
    ) -> PlanResult<Option<f64>> {
        let left = node.input(0)?;
        let right = node.input(1)?;
        let left_width = self.arena.node(left)?.width();
        let width = left_width + self.arena.node(right)?.width();
        let sides = split_by_side(predicate, left_width);

        let mut classes = UnionFind::<usize>::new(width);
        if join_type == JoinType::Inner {
            for (l, r) in JoinKeys::split(condition, left_width).pairs {
                if left_width + r < width {
                    classes.union(l, left_width + r);
                }
            }
        }

        let mut tied = BTreeSet::new();
        let mut untied = ColumnSet::new();
        for c in columns.iter().filter(|c| *c < width) {
            let root = classes.find(c);
            let shared = (0..width).any(|o| o != c && classes.find(o) == root);
            if shared {
                tied.insert(root);
            } else {
                untied.insert(c);
            }
        }

        let mut product = 1.0;
        for root in &tied {
            let mut min_ndv: Option<f64> = None;
            for member in (0..width).filter(|o| classes.find(*o) == *root) {
                let Some(ndv) = self.side_distinct(left, right, left_width, member, &sides)? else {
                    return Ok(None);
                };
                min_ndv = Some(min_ndv.map_or(ndv, |m| m.min(ndv)));
            }
            product *= min_ndv.unwrap_or(1.0);
        }

        let left_cols = untied.below(left_width);
        if !left_cols.is_empty() {
            match self.distinct_count(left, &left_cols, sides.left.as_ref())? {
                Some(ndv) => product *= ndv,
                None => return Ok(None),
            }
        }
        let right_cols = untied.from_offset(left_width);
        if !right_cols.is_empty() {
            match self.distinct_count(right, &right_cols, sides.right.as_ref())? {
                Some(ndv) => product *= ndv,
                None => return Ok(None),
            }
        }

        let residual = self.selectivity(node, sides.residual.as_ref())?;
        let rows = self.row_count(node.id)?;
        Ok(Some(product.min(rows * residual)))
    }

    fn side_distinct(
        &self,
        left: NodeId,
        right: NodeId,
        left_width: usize,
        ordinal: usize,
        sides: &SidePredicates,
    ) -> PlanResult<Option<f64>> {
        if ordinal < left_width {
            self.distinct_count(left, &ColumnSet::from([ordinal]), sides.left.as_ref())
        } else {
            self.distinct_count(
                right,
                &ColumnSet::from([ordinal - left_width]),
                sides.right.as_ref(),
            )
        }
    }
}
