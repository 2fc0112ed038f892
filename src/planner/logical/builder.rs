//! Build plan arenas, deriving each node's output schema from its inputs.

use crate::planner::logical::{
    AggPhase, ColumnSet, Expr, JoinType, Literal, NodeId, NodeKind, PlanArena, ScanNode, TableRef,
};
use crate::planner::{PlanError, PlanResult};

#[derive(Debug, Default)]
pub struct PlanBuilder {
    arena: PlanArena,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arena(&self) -> &PlanArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut PlanArena {
        &mut self.arena
    }

    pub fn finish(self) -> PlanArena {
        self.arena
    }

    fn fields_of(&self, id: NodeId) -> PlanResult<Vec<String>> {
        Ok(self.arena.node(id)?.fields.clone())
    }

    /// Scan every listed column of `table`.
    pub fn scan(&mut self, table: TableRef, columns: &[&str]) -> PlanResult<NodeId> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        self.scan_node(ScanNode::new(table, columns))
    }

    pub fn scan_node(&mut self, scan: ScanNode) -> PlanResult<NodeId> {
        let fields = scan.columns.clone();
        self.arena.add(NodeKind::Scan(scan), vec![], fields, None)
    }

    pub fn filter(&mut self, input: NodeId, condition: Expr) -> PlanResult<NodeId> {
        let fields = self.fields_of(input)?;
        self.arena
            .add(NodeKind::Filter { condition }, vec![input], fields, None)
    }

    pub fn project(&mut self, input: NodeId, exprs: Vec<(Expr, &str)>) -> PlanResult<NodeId> {
        let fields = exprs.iter().map(|(_, name)| name.to_string()).collect();
        let exprs = exprs.into_iter().map(|(e, _)| e).collect();
        self.arena
            .add(NodeKind::Project { exprs }, vec![input], fields, None)
    }

    pub fn aggregate(
        &mut self,
        input: NodeId,
        group_set: ColumnSet,
        aggregate_calls: usize,
    ) -> PlanResult<NodeId> {
        self.aggregate_with(input, group_set, Vec::new(), aggregate_calls, AggPhase::Single)
    }

    pub fn aggregate_with(
        &mut self,
        input: NodeId,
        group_set: ColumnSet,
        grouping_sets: Vec<ColumnSet>,
        aggregate_calls: usize,
        phase: AggPhase,
    ) -> PlanResult<NodeId> {
        let input_fields = self.fields_of(input)?;
        let mut fields = Vec::with_capacity(group_set.len() + aggregate_calls);
        for ordinal in group_set.iter() {
            let name = input_fields.get(ordinal).ok_or_else(|| {
                PlanError::InvalidPlan(format!("group column ${} outside input", ordinal))
            })?;
            fields.push(name.clone());
        }
        if let Some(bad) = grouping_sets.iter().find(|s| !s.is_subset(&group_set)) {
            return Err(PlanError::InvalidPlan(format!(
                "grouping set {} not within group set {}",
                bad, group_set
            )));
        }
        fields.extend((0..aggregate_calls).map(|i| format!("agg${}", i)));
        self.arena.add(
            NodeKind::Aggregate {
                group_set,
                grouping_sets,
                aggregate_calls,
                phase,
            },
            vec![input],
            fields,
            None,
        )
    }

    pub fn join(
        &mut self,
        left: NodeId,
        right: NodeId,
        join_type: JoinType,
        condition: Expr,
    ) -> PlanResult<NodeId> {
        let mut fields = self.fields_of(left)?;
        fields.extend(self.fields_of(right)?);
        self.arena.add(
            NodeKind::Join {
                join_type,
                condition,
            },
            vec![left, right],
            fields,
            None,
        )
    }

    pub fn multi_join(&mut self, inputs: Vec<NodeId>, conditions: Vec<Expr>) -> PlanResult<NodeId> {
        let mut fields = Vec::new();
        for input in &inputs {
            fields.extend(self.fields_of(*input)?);
        }
        self.arena
            .add(NodeKind::MultiJoin { conditions }, inputs, fields, None)
    }

    pub fn window(&mut self, input: NodeId, window_fields: usize) -> PlanResult<NodeId> {
        let mut fields = self.fields_of(input)?;
        fields.extend((0..window_fields).map(|i| format!("w${}", i)));
        self.arena
            .add(NodeKind::Window { window_fields }, vec![input], fields, None)
    }

    pub fn values(&mut self, fields: &[&str], tuples: Vec<Vec<Literal>>) -> PlanResult<NodeId> {
        if let Some(bad) = tuples.iter().find(|t| t.len() != fields.len()) {
            return Err(PlanError::InvalidPlan(format!(
                "tuple of width {} in values of width {}",
                bad.len(),
                fields.len()
            )));
        }
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.arena
            .add(NodeKind::Values { tuples }, vec![], fields, None)
    }

    pub fn flatten(&mut self, input: NodeId, flattened: ColumnSet) -> PlanResult<NodeId> {
        let fields = self.fields_of(input)?;
        self.arena
            .add(NodeKind::Flatten { flattened }, vec![input], fields, None)
    }

    pub fn sort(&mut self, input: NodeId) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Sort, input)
    }

    pub fn limit(&mut self, input: NodeId, offset: u64, fetch: Option<u64>) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Limit { offset, fetch }, input)
    }

    pub fn exchange(&mut self, input: NodeId, broadcast: bool) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Exchange { broadcast }, input)
    }

    pub fn bridge_reader(&mut self, input: NodeId) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::BridgeReader, input)
    }

    pub fn subtree(&mut self, input: NodeId) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Subtree, input)
    }

    pub fn placeholder(&mut self, group: u32, representative: NodeId) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Placeholder { group }, representative)
    }

    pub fn vertex(&mut self, wrapped: NodeId) -> PlanResult<NodeId> {
        self.passthrough(NodeKind::Vertex, wrapped)
    }

    fn passthrough(&mut self, kind: NodeKind, input: NodeId) -> PlanResult<NodeId> {
        let fields = self.fields_of(input)?;
        self.arena.add(kind, vec![input], fields, None)
    }

    /// Attach a self-declared row-count estimate to `id`.
    pub fn hint(&mut self, id: NodeId, rows: f64) -> PlanResult<NodeId> {
        self.arena.set_row_count_hint(id, Some(rows))?;
        Ok(id)
    }
}
