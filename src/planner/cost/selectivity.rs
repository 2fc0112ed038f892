//! Predicate selectivity and the shared numeric helpers.

use crate::metadata::StatisticsProviderExt;
use crate::planner::cost::CardinalityEstimator;
use crate::planner::logical::{BinaryOp, Expr, Literal, PlanNode};
use crate::planner::PlanResult;

/// Marginal distinctness retained per additional grouping column.
pub const NDV_DECAY_BASE: f64 = 0.9;

const EQUALITY_SELECTIVITY: f64 = 0.15;
const INEQUALITY_SELECTIVITY: f64 = 0.85;
const RANGE_SELECTIVITY: f64 = 0.5;
const IS_NOT_NULL_SELECTIVITY: f64 = 0.9;
const IS_NULL_SELECTIVITY: f64 = 0.1;
/// Anything we cannot analyze.
const DEFAULT_SELECTIVITY: f64 = 0.25;

/// Selectivity guessed from predicate shape alone.
///
/// Conjuncts multiply; `OR` combines as a probability union.
pub fn guess_selectivity(predicate: Option<&Expr>) -> f64 {
    match predicate {
        None => 1.0,
        Some(p) => p.conjuncts().into_iter().map(guess_conjunct).product(),
    }
}

fn guess_conjunct(expr: &Expr) -> f64 {
    match expr {
        Expr::Literal(Literal::Bool(true)) => 1.0,
        Expr::Literal(Literal::Bool(false)) | Expr::Literal(Literal::Null) => 0.0,
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => guess_conjunct(left) * guess_conjunct(right),
            BinaryOp::Or => {
                let l = guess_conjunct(left);
                let r = guess_conjunct(right);
                l + r - l * r
            }
            BinaryOp::Eq => EQUALITY_SELECTIVITY,
            BinaryOp::NotEq => INEQUALITY_SELECTIVITY,
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => RANGE_SELECTIVITY,
            BinaryOp::Plus | BinaryOp::Minus | BinaryOp::Mul | BinaryOp::Div => DEFAULT_SELECTIVITY,
        },
        Expr::Not(inner) => 1.0 - guess_conjunct(inner),
        Expr::IsNotNull(_) => IS_NOT_NULL_SELECTIVITY,
        Expr::IsNull(_) => IS_NULL_SELECTIVITY,
        Expr::InList { list, .. } => (EQUALITY_SELECTIVITY * list.len() as f64).min(1.0),
        _ => DEFAULT_SELECTIVITY,
    }
}

/// Expected number of distinct values when drawing `selected` items from a
/// domain of `domain` equally likely values.
pub fn num_distinct_vals(domain: f64, selected: f64) -> f64 {
    let domain = cap_infinity(domain);
    let selected = cap_infinity(selected);
    if !(domain > 0.0) || !(selected > 0.0) {
        return 0.0;
    }
    if domain <= 1.0 {
        return domain.min(selected);
    }
    let exponent = selected * (-1.0 / domain).ln_1p();
    let result = (1.0 - exponent.exp()) * domain;
    result.min(domain).min(selected).max(0.0)
}

/// NDV of a column after a filter keeping fraction `selectivity` of `rows`.
pub fn filtered_ndv(ndv: f64, rows: f64, selectivity: f64) -> f64 {
    if selectivity >= 1.0 {
        return ndv;
    }
    if !(ndv > 0.0) || !(selectivity > 0.0) {
        return 0.0;
    }
    let rows_per_value = (rows / ndv).max(1.0);
    ndv * (1.0 - (1.0 - selectivity).powf(rows_per_value))
}

/// Distinct count with no statistics: `(1 − 0.9^n) × rows × selectivity`.
pub fn decay_distinct(columns: usize, rows: f64, selectivity: f64) -> f64 {
    (1.0 - NDV_DECAY_BASE.powi(columns as i32)) * rows * selectivity
}

/// Row counts are never negative or NaN.
pub fn sanitize(rows: f64) -> f64 {
    if rows.is_nan() {
        0.0
    } else {
        cap_infinity(rows).max(0.0)
    }
}

fn cap_infinity(v: f64) -> f64 {
    if v == f64::INFINITY {
        f64::MAX
    } else {
        v
    }
}

impl<'a> CardinalityEstimator<'a> {
    /// Selectivity of `predicate` over `node`'s output.
    ///
    /// Equality and IN-list conjuncts on a column traceable to a base table
    /// use that column's NDV when statistics have it; everything else falls
    /// back to [`guess_selectivity`].
    pub fn selectivity(&self, node: &PlanNode, predicate: Option<&Expr>) -> PlanResult<f64> {
        let Some(predicate) = predicate else {
            return Ok(1.0);
        };
        let mut selectivity = 1.0;
        for conjunct in predicate.conjuncts() {
            selectivity *= match self.ndv_selectivity(node, conjunct)? {
                Some(s) => s,
                None => guess_conjunct(conjunct),
            };
        }
        Ok(selectivity.clamp(0.0, 1.0))
    }

    fn ndv_selectivity(&self, node: &PlanNode, conjunct: &Expr) -> PlanResult<Option<f64>> {
        if !self.stats_enabled() {
            return Ok(None);
        }
        let (column, values) = match conjunct {
            Expr::Binary {
                op: BinaryOp::Eq,
                left,
                right,
            } => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(c), Expr::Literal(_)) | (Expr::Literal(_), Expr::Column(c)) => (*c, 1),
                _ => return Ok(None),
            },
            Expr::InList { expr, list } => match expr.as_ref() {
                Expr::Column(c) => (*c, list.len()),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        let Some(origin) = self.column_origin(node.id, column)? else {
            return Ok(None);
        };
        let ndv = self.stats.ndv_or_none(&origin.column, &origin.table);
        Ok(ndv
            .filter(|n| *n > 0)
            .map(|n| (values as f64 / n as f64).min(1.0)))
    }
}
