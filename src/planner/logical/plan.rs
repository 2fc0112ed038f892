//! Plan node arena and operator kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::expr::{ColumnSet, Expr, Literal};
use crate::planner::{PlanError, PlanResult};

/// Stable, arena-assigned node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Table identity plus the catalog facts the estimators use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    /// Declared unique keys, as column names.
    #[serde(default)]
    pub unique_keys: Vec<Vec<String>>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_keys: Vec::new(),
        }
    }

    pub fn with_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys
            .push(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Filter already embedded in a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFilter {
    pub predicate: Expr,
    /// False when the pushed filter only approximates the user's predicate.
    pub exact: bool,
}

/// Partition pruning applied to a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionPruning {
    #[default]
    None,
    /// Pruning happened and is reflected in `split_ratio`.
    Measured,
    /// A pruning predicate is present but its effect is not measurable.
    Unmeasured,
}

/// Base table or table-function scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanNode {
    pub table: TableRef,
    /// Table column name for each output ordinal.
    pub columns: Vec<String>,
    #[serde(default)]
    pub filter: Option<ScanFilter>,
    #[serde(default = "one")]
    pub split_ratio: f64,
    #[serde(default)]
    pub partition_pruning: PartitionPruning,
    /// Runtime feedback from prior executions.
    #[serde(default)]
    pub observed_adjustment: Option<f64>,
    /// Last-known row count declared by the catalog.
    #[serde(default)]
    pub declared_row_count: Option<f64>,
    #[serde(default)]
    pub table_function: bool,
}

fn one() -> f64 {
    1.0
}

impl ScanNode {
    pub fn new(table: TableRef, columns: Vec<String>) -> Self {
        Self {
            table,
            columns,
            filter: None,
            split_ratio: 1.0,
            partition_pruning: PartitionPruning::None,
            observed_adjustment: None,
            declared_row_count: None,
            table_function: false,
        }
    }

    pub fn column_name(&self, ordinal: usize) -> Option<&str> {
        self.columns.get(ordinal).map(String::as_str)
    }

    pub fn ordinal_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// Aggregation phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggPhase {
    #[default]
    Single,
    /// First phase of a two-phase aggregation.
    Partial,
    /// Second phase; consumes a partial aggregate.
    Final,
}

/// Operator kinds understood by the estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Scan(ScanNode),
    Filter {
        condition: Expr,
    },
    /// Output ordinal `i` is `exprs[i]` over the input.
    Project {
        exprs: Vec<Expr>,
    },
    /// Output is the group columns (ascending input ordinal) followed by
    /// `aggregate_calls` computed columns.
    Aggregate {
        group_set: ColumnSet,
        /// Empty means the single grouping set `group_set`.
        #[serde(default)]
        grouping_sets: Vec<ColumnSet>,
        aggregate_calls: usize,
        #[serde(default)]
        phase: AggPhase,
    },
    Join {
        join_type: JoinType,
        condition: Expr,
    },
    /// Flattened join-reordering input.
    MultiJoin {
        conditions: Vec<Expr>,
    },
    /// Input columns followed by `window_fields` computed columns.
    Window {
        window_fields: usize,
    },
    Values {
        tuples: Vec<Vec<Literal>>,
    },
    /// Unnests `flattened` columns in place.
    Flatten {
        flattened: ColumnSet,
    },
    Sort,
    Limit {
        offset: u64,
        fetch: Option<u64>,
    },
    Exchange {
        broadcast: bool,
    },
    BridgeReader,
    Subtree,
    /// Stands in for a search-time equivalence group; input 0 is the
    /// current representative.
    Placeholder {
        group: u32,
    },
    /// Wrapper used during rewrite passes; input 0 is the wrapped node.
    Vertex,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Scan(s) if s.table_function => "TableFunction",
            NodeKind::Scan(_) => "Scan",
            NodeKind::Filter { .. } => "Filter",
            NodeKind::Project { .. } => "Project",
            NodeKind::Aggregate { .. } => "Aggregate",
            NodeKind::Join { .. } => "Join",
            NodeKind::MultiJoin { .. } => "MultiJoin",
            NodeKind::Window { .. } => "Window",
            NodeKind::Values { .. } => "Values",
            NodeKind::Flatten { .. } => "Flatten",
            NodeKind::Sort => "Sort",
            NodeKind::Limit { .. } => "Limit",
            NodeKind::Exchange { .. } => "Exchange",
            NodeKind::BridgeReader => "BridgeReader",
            NodeKind::Subtree => "Subtree",
            NodeKind::Placeholder { .. } => "Placeholder",
            NodeKind::Vertex => "Vertex",
        }
    }

    /// Placeholders and vertices are revisited many times during search and
    /// may be re-bound, so their cache entries always short-circuit.
    pub fn is_search_wrapper(&self) -> bool {
        matches!(self, NodeKind::Placeholder { .. } | NodeKind::Vertex)
    }

    /// Highest column ordinal this node reads, checked against the width
    /// of the row it reads from (the scan itself for scans).
    fn check_ordinals(&self, input_width: usize) -> Result<(), String> {
        let (width, read) = match self {
            NodeKind::Scan(scan) => (
                scan.columns.len(),
                scan.filter
                    .as_ref()
                    .map(|f| f.predicate.columns())
                    .unwrap_or_default(),
            ),
            NodeKind::Filter { condition } | NodeKind::Join { condition, .. } => {
                (input_width, condition.columns())
            }
            NodeKind::Project { exprs } => (
                input_width,
                exprs
                    .iter()
                    .fold(ColumnSet::new(), |acc, e| acc.union(&e.columns())),
            ),
            NodeKind::MultiJoin { conditions } => (
                input_width,
                conditions
                    .iter()
                    .fold(ColumnSet::new(), |acc, e| acc.union(&e.columns())),
            ),
            NodeKind::Aggregate { group_set, .. } => (input_width, group_set.clone()),
            NodeKind::Flatten { flattened } => (input_width, flattened.clone()),
            _ => return Ok(()),
        };
        let result = match read.iter().find(|c| *c >= width) {
            Some(c) => Err(format!(
                "{} reads column ${} of a {}-column row",
                self.name(),
                c,
                width
            )),
            None => Ok(()),
        };
        result
    }

    fn accepts_inputs(&self, n: usize) -> bool {
        match self {
            NodeKind::Scan(_) | NodeKind::Values { .. } => n == 0,
            NodeKind::Join { .. } => n == 2,
            NodeKind::MultiJoin { .. } => n >= 1,
            _ => n == 1,
        }
    }
}

/// A node of the operator tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub inputs: Vec<NodeId>,
    /// Output schema.
    pub fields: Vec<String>,
    /// Self-declared row-count estimate overriding the per-kind default.
    #[serde(default)]
    pub row_count_hint: Option<f64>,
}

impl PlanNode {
    pub fn input(&self, i: usize) -> PlanResult<NodeId> {
        self.inputs.get(i).copied().ok_or_else(|| {
            PlanError::InvalidPlan(format!("{} {} has no input {}", self.kind.name(), self.id, i))
        })
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

/// Owns every node of one plan. Ordinary nodes may only reference nodes
/// created before them; placeholders and vertices can be re-bound later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanArena {
    nodes: Vec<PlanNode>,
}

impl PlanArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an arena from deserialized nodes, checking ids and inputs.
    pub fn from_nodes(nodes: Vec<PlanNode>) -> PlanResult<Self> {
        let mut arena = Self::new();
        for node in nodes {
            if node.id.0 as usize != arena.nodes.len() {
                return Err(PlanError::InvalidPlan(format!(
                    "node {} out of order (expected #{})",
                    node.id,
                    arena.nodes.len()
                )));
            }
            arena.add(node.kind, node.inputs, node.fields, node.row_count_hint)?;
        }
        Ok(arena)
    }

    pub fn add(
        &mut self,
        kind: NodeKind,
        inputs: Vec<NodeId>,
        fields: Vec<String>,
        row_count_hint: Option<f64>,
    ) -> PlanResult<NodeId> {
        if !kind.accepts_inputs(inputs.len()) {
            return Err(PlanError::InvalidPlan(format!(
                "{} cannot take {} inputs",
                kind.name(),
                inputs.len()
            )));
        }
        let id = NodeId(self.nodes.len() as u32);
        if let Some(bad) = inputs.iter().find(|i| i.0 >= id.0) {
            return Err(PlanError::UnknownNode(*bad));
        }
        let input_width: usize = inputs
            .iter()
            .filter_map(|i| self.nodes.get(i.0 as usize))
            .map(PlanNode::width)
            .sum();
        kind.check_ordinals(input_width)
            .map_err(PlanError::InvalidPlan)?;
        self.nodes.push(PlanNode {
            id,
            kind,
            inputs,
            fields,
            row_count_hint,
        });
        Ok(id)
    }

    pub fn node(&self, id: NodeId) -> PlanResult<&PlanNode> {
        self.nodes
            .get(id.0 as usize)
            .ok_or(PlanError::UnknownNode(id))
    }

    /// Point a placeholder or vertex at a different node.
    pub fn rebind(&mut self, id: NodeId, target: NodeId) -> PlanResult<()> {
        if target.0 as usize >= self.nodes.len() {
            return Err(PlanError::UnknownNode(target));
        }
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(PlanError::UnknownNode(id))?;
        if !node.kind.is_search_wrapper() {
            return Err(PlanError::InvalidPlan(format!(
                "{} {} cannot be re-bound",
                node.kind.name(),
                id
            )));
        }
        node.inputs = vec![target];
        Ok(())
    }

    pub fn set_row_count_hint(&mut self, id: NodeId, hint: Option<f64>) -> PlanResult<()> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or(PlanError::UnknownNode(id))?;
        node.row_count_hint = hint;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }

    /// Last node added; conventionally the plan root.
    pub fn root(&self) -> Option<NodeId> {
        self.nodes.last().map(|n| n.id)
    }
}
