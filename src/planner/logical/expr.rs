//! Scalar and predicate expressions over a node's output columns.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Order-independent set of output-field ordinals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnSet(BTreeSet<usize>);

impl ColumnSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Set containing `0..n`.
    pub fn range(n: usize) -> Self {
        Self((0..n).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, ordinal: usize) -> bool {
        self.0.contains(&ordinal)
    }

    pub fn insert(&mut self, ordinal: usize) -> bool {
        self.0.insert(ordinal)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &ColumnSet) -> ColumnSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn is_subset(&self, other: &ColumnSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Ordinals below `width` stay; the rest are dropped.
    pub fn below(&self, width: usize) -> ColumnSet {
        self.iter().filter(|c| *c < width).collect()
    }

    /// Ordinals at or above `width`, shifted down by `width`.
    pub fn from_offset(&self, width: usize) -> ColumnSet {
        self.iter().filter(|c| *c >= width).map(|c| c - width).collect()
    }

    pub fn shift(&self, offset: usize) -> ColumnSet {
        self.iter().map(|c| c + offset).collect()
    }
}

impl FromIterator<usize> for ColumnSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[usize; N]> for ColumnSet {
    fn from(ordinals: [usize; N]) -> Self {
        ordinals.into_iter().collect()
    }
}

impl fmt::Display for ColumnSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|c| format!("${}", c)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte
        )
    }
}

/// Expression tree. Column ordinals refer to the input row of the node
/// that owns the expression (for joins: left fields then right fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(usize),
    Literal(Literal),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
    },
    Case {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

// =========================================================================
// Constructors
// =========================================================================

pub fn col(ordinal: usize) -> Expr {
    Expr::Column(ordinal)
}

pub fn lit_int(v: i64) -> Expr {
    Expr::Literal(Literal::Int(v))
}

pub fn lit_str(v: impl Into<String>) -> Expr {
    Expr::Literal(Literal::Str(v.into()))
}

pub fn lit_bool(v: bool) -> Expr {
    Expr::Literal(Literal::Bool(v))
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Eq, left, right)
}

pub fn gt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Gt, left, right)
}

pub fn lt(left: Expr, right: Expr) -> Expr {
    binary(BinaryOp::Lt, left, right)
}

/// Conjunction of `exprs`; an empty list yields literal `true`.
pub fn and_all(exprs: impl IntoIterator<Item = Expr>) -> Expr {
    let mut iter = exprs.into_iter().filter(|e| !e.is_always_true());
    let Some(first) = iter.next() else {
        return lit_bool(true);
    };
    iter.fold(first, |acc, e| binary(BinaryOp::And, acc, e))
}

impl Expr {
    pub fn is_always_true(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Bool(true)))
    }

    pub fn is_always_false(&self) -> bool {
        matches!(self, Expr::Literal(Literal::Bool(false)))
    }

    pub fn as_column(&self) -> Option<usize> {
        match self {
            Expr::Column(c) => Some(*c),
            _ => None,
        }
    }

    /// Flatten top-level ANDs.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                left.collect_conjuncts(out);
                right.collect_conjuncts(out);
            }
            e if e.is_always_true() => {}
            e => out.push(e),
        }
    }

    /// Every column ordinal the expression reads.
    pub fn columns(&self) -> ColumnSet {
        let mut set = ColumnSet::new();
        self.visit_columns(&mut |c| {
            set.insert(c);
        });
        set
    }

    fn visit_columns(&self, f: &mut impl FnMut(usize)) {
        match self {
            Expr::Column(c) => f(*c),
            Expr::Literal(_) => {}
            Expr::Binary { left, right, .. } => {
                left.visit_columns(f);
                right.visit_columns(f);
            }
            Expr::Not(e) | Expr::IsNull(e) | Expr::IsNotNull(e) => e.visit_columns(f),
            Expr::InList { expr, list } => {
                expr.visit_columns(f);
                list.iter().for_each(|e| e.visit_columns(f));
            }
            Expr::Case { branches, otherwise } => {
                for (when, then) in branches {
                    when.visit_columns(f);
                    then.visit_columns(f);
                }
                if let Some(e) = otherwise {
                    e.visit_columns(f);
                }
            }
            Expr::Function { args, .. } => args.iter().for_each(|e| e.visit_columns(f)),
        }
    }

    /// Rewrite every column ordinal through `map`. Returns `None` if any
    /// ordinal has no image.
    pub fn remap(&self, map: &impl Fn(usize) -> Option<usize>) -> Option<Expr> {
        Some(match self {
            Expr::Column(c) => Expr::Column(map(*c)?),
            Expr::Literal(l) => Expr::Literal(l.clone()),
            Expr::Binary { op, left, right } => Expr::Binary {
                op: *op,
                left: Box::new(left.remap(map)?),
                right: Box::new(right.remap(map)?),
            },
            Expr::Not(e) => Expr::Not(Box::new(e.remap(map)?)),
            Expr::IsNull(e) => Expr::IsNull(Box::new(e.remap(map)?)),
            Expr::IsNotNull(e) => Expr::IsNotNull(Box::new(e.remap(map)?)),
            Expr::InList { expr, list } => Expr::InList {
                expr: Box::new(expr.remap(map)?),
                list: list.iter().map(|e| e.remap(map)).collect::<Option<_>>()?,
            },
            Expr::Case { branches, otherwise } => Expr::Case {
                branches: branches
                    .iter()
                    .map(|(w, t)| Some((w.remap(map)?, t.remap(map)?)))
                    .collect::<Option<_>>()?,
                otherwise: match otherwise {
                    Some(e) => Some(Box::new(e.remap(map)?)),
                    None => None,
                },
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args.iter().map(|e| e.remap(map)).collect::<Option<_>>()?,
            },
        })
    }

    /// Shift every ordinal down by `offset` (ordinals below it are invalid).
    pub fn shift_down(&self, offset: usize) -> Option<Expr> {
        self.remap(&|c| c.checked_sub(offset))
    }
}

/// `None` and literal `true` both mean "no predicate".
pub fn is_trivial(predicate: Option<&Expr>) -> bool {
    predicate.map_or(true, Expr::is_always_true)
}
