//! Tests for join cardinality estimation

use cardinal::config::CostModelConfig;
use cardinal::metadata::{DisabledStatistics, InMemoryStatistics, StatisticsProvider, TableStatistics};
use cardinal::planner::cost::{CardinalityEstimator, JoinKeys};
use cardinal::planner::logical::{
    and_all, col, eq, gt, lit_bool, lit_int, lit_str, Expr, JoinType, NodeId, PlanArena, PlanBuilder,
    ScanNode, TableRef,
};
use cardinal::planner::PlanningSession;

fn rows_with(
    config: CostModelConfig,
    arena: &PlanArena,
    stats: &dyn StatisticsProvider,
    id: NodeId,
) -> f64 {
    let session = PlanningSession::new(config);
    CardinalityEstimator::new(arena, &session, stats)
        .row_count(id)
        .unwrap()
}

fn rows(arena: &PlanArena, stats: &dyn StatisticsProvider, id: NodeId) -> f64 {
    rows_with(CostModelConfig::default(), arena, stats, id)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn declared_scan(b: &mut PlanBuilder, table: TableRef, columns: &[&str], rows: f64) -> NodeId {
    let mut scan = ScanNode::new(table, columns.iter().map(|c| c.to_string()).collect());
    scan.declared_row_count = Some(rows);
    b.scan_node(scan).unwrap()
}

// ============================================================================
// Classical NDV path
// ============================================================================

fn two_tables(left_ndv: u64, right_ndv: u64) -> InMemoryStatistics {
    let stats = InMemoryStatistics::new();
    stats.set_table("l", TableStatistics::with_row_count(100).with_ndv("k", left_ndv));
    stats.set_table("r", TableStatistics::with_row_count(200).with_ndv("k", right_ndv));
    stats
}

fn join_lr(join_type: JoinType) -> (PlanArena, NodeId) {
    let mut b = PlanBuilder::new();
    let l = b.scan(TableRef::new("l"), &["k"]).unwrap();
    let r = b.scan(TableRef::new("r"), &["k"]).unwrap();
    let j = b.join(l, r, join_type, eq(col(0), col(1))).unwrap();
    (b.finish(), j)
}

#[test]
fn test_inner_join_from_key_ndvs() {
    let (arena, j) = join_lr(JoinType::Inner);
    // 10 × 100 × 200 / (10 × 10)
    assert_eq!(rows(&arena, &two_tables(10, 10), j), 2000.0);
}

#[test]
fn test_outer_joins_add_unmatched_rows() {
    let stats = two_tables(10, 20);
    // inner: 10 × 100 × 200 / (10 × 20) = 1000
    let (arena, j) = join_lr(JoinType::Inner);
    assert_close(rows(&arena, &stats, j), 1_000.0);
    // every left key finds a match
    let (arena, j) = join_lr(JoinType::Left);
    assert_close(rows(&arena, &stats, j), 1_000.0);
    // half the right keys are unmatched: + 0.5 × 200
    let (arena, j) = join_lr(JoinType::Right);
    assert_close(rows(&arena, &stats, j), 1_100.0);
    let (arena, j) = join_lr(JoinType::Full);
    assert_close(rows(&arena, &stats, j), 1_100.0);
}

#[test]
fn test_zero_ndv_falls_back_to_generic_formula() {
    let (arena, j) = join_lr(JoinType::Inner);
    // 100 × 200 × 0.15
    assert_close(rows(&arena, &two_tables(0, 10), j), 3_000.0);
}

#[test]
fn test_cross_join_with_stats_is_product() {
    let mut b = PlanBuilder::new();
    let l = b.scan(TableRef::new("l"), &["k"]).unwrap();
    let r = b.scan(TableRef::new("r"), &["k"]).unwrap();
    let j = b.join(l, r, JoinType::Inner, lit_bool(true)).unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &two_tables(10, 10), j), 20_000.0);
}

#[test]
fn test_row_counts_without_key_ndvs_use_generic_formula() {
    let stats = InMemoryStatistics::new();
    stats.set_table("l", TableStatistics::with_row_count(100));
    stats.set_table("r", TableStatistics::with_row_count(200));
    let (arena, j) = join_lr(JoinType::Inner);

    // 100 × 200 × 0.15
    assert_close(rows(&arena, &stats, j), 3_000.0);
}

#[test]
fn test_enabled_but_empty_stats_use_foreign_key_heuristic() {
    let mut b = PlanBuilder::new();
    let l = declared_scan(&mut b, TableRef::new("l"), &["k"], 1_000.0);
    let r = declared_scan(&mut b, TableRef::new("r"), &["k"], 1_000.0);
    let j = b.join(l, r, JoinType::Inner, eq(col(0), col(1))).unwrap();
    let arena = b.finish();

    let empty = InMemoryStatistics::new();
    assert_close(rows(&arena, &empty, j), 1_000.0);
    assert_close(rows(&arena, &empty, j), rows(&arena, &DisabledStatistics, j));
}

// ============================================================================
// Foreign-key heuristic (statistics disabled)
// ============================================================================

fn orders_customers(join_type: JoinType, condition: Expr) -> (PlanArena, NodeId) {
    let mut b = PlanBuilder::new();
    let orders = declared_scan(
        &mut b,
        TableRef::new("orders"),
        &["id", "customer_id", "status"],
        1_000.0,
    );
    let customers = declared_scan(&mut b, TableRef::new("customers"), &["id", "region"], 300.0);
    let j = b.join(orders, customers, join_type, condition).unwrap();
    (b.finish(), j)
}

#[test]
fn test_foreign_key_join_keeps_fact_rows() {
    let (arena, j) = orders_customers(JoinType::Inner, eq(col(1), col(3)));
    assert_close(rows(&arena, &DisabledStatistics, j), 1_000.0);
}

#[test]
fn test_foreign_key_residual_is_clamped() {
    let residual = and_all([eq(col(1), col(3)), gt(col(2), lit_int(1))]);
    let (arena, j) = orders_customers(JoinType::Inner, residual);
    assert_close(rows(&arena, &DisabledStatistics, j), 500.0);

    // 0.15 × 0.15 is below the floor
    let selective = and_all([
        eq(col(1), col(3)),
        eq(col(2), lit_str("open")),
        eq(col(4), lit_str("EU")),
    ]);
    let (arena, j) = orders_customers(JoinType::Inner, selective);
    assert_close(rows(&arena, &DisabledStatistics, j), 100.0);

    let config = CostModelConfig {
        join_selectivity_floor: 0.01,
        ..CostModelConfig::default()
    };
    assert_close(rows_with(config, &arena, &DisabledStatistics, j), 22.5);
}

#[test]
fn test_outer_joins_keep_preserved_side() {
    let selective = and_all([
        eq(col(1), col(3)),
        eq(col(2), lit_str("open")),
        eq(col(4), lit_str("EU")),
    ]);
    let (arena, j) = orders_customers(JoinType::Left, selective.clone());
    assert_close(rows(&arena, &DisabledStatistics, j), 1_000.0);
    let (arena, j) = orders_customers(JoinType::Right, selective.clone());
    assert_close(rows(&arena, &DisabledStatistics, j), 300.0);
    let (arena, j) = orders_customers(JoinType::Full, selective);
    assert_close(rows(&arena, &DisabledStatistics, j), 1_000.0);
}

#[test]
fn test_always_true_condition_penalizes_right_joins() {
    let (arena, inner) = orders_customers(JoinType::Inner, lit_bool(true));
    assert_close(rows(&arena, &DisabledStatistics, inner), 1_000.0);

    let (arena, left) = orders_customers(JoinType::Left, lit_bool(true));
    let left_rows = rows(&arena, &DisabledStatistics, left);
    let (arena, right) = orders_customers(JoinType::Right, lit_bool(true));
    let right_rows = rows(&arena, &DisabledStatistics, right);

    assert_close(right_rows, 1_050.0);
    assert!(right_rows > left_rows);
}

#[test]
fn test_self_join_uses_its_own_factor() {
    let mut b = PlanBuilder::new();
    let a = declared_scan(&mut b, TableRef::new("orders"), &["id", "customer_id"], 1_000.0);
    let c = declared_scan(&mut b, TableRef::new("orders"), &["id", "customer_id"], 1_000.0);
    let j = b.join(a, c, JoinType::Inner, eq(col(1), col(3))).unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &DisabledStatistics, j), 1_500.0);

    let session = PlanningSession::default();
    let est = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);
    let node = arena.node(j).unwrap();
    let keys = JoinKeys::split(&eq(col(1), col(3)), 2);
    assert!(est.is_self_join(node, &keys).unwrap());

    let config = CostModelConfig {
        self_join_factor: 2.0,
        ..CostModelConfig::default()
    };
    assert_close(rows_with(config, &arena, &DisabledStatistics, j), 2_000.0);
}

#[test]
fn test_different_tables_are_not_a_self_join() {
    let (arena, j) = orders_customers(JoinType::Inner, eq(col(1), col(3)));
    let session = PlanningSession::default();
    let est = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);
    let keys = JoinKeys::split(&eq(col(1), col(3)), 3);
    assert!(!est.is_self_join(arena.node(j).unwrap(), &keys).unwrap());
}

// ============================================================================
// Semi-join costing vs classical NDV path
// ============================================================================

fn star_stats() -> InMemoryStatistics {
    let stats = InMemoryStatistics::new();
    stats.set_table(
        "orders",
        TableStatistics::with_row_count(1_000).with_ndv("customer_id", 50),
    );
    stats.set_table(
        "customers",
        TableStatistics::with_row_count(100)
            .with_ndv("id", 100)
            .with_ndv("region", 5),
    );
    stats
}

/// orders ⋈ σ(region = 'EU')(customers) on customer_id = id.
fn star_join(join_type: JoinType, keyed: bool) -> (PlanArena, NodeId) {
    let mut b = PlanBuilder::new();
    let orders = b
        .scan(TableRef::new("orders"), &["id", "customer_id", "status"])
        .unwrap();
    let table = if keyed {
        TableRef::new("customers").with_key(["id"])
    } else {
        TableRef::new("customers")
    };
    let customers = b.scan(table, &["id", "region"]).unwrap();
    let eu = b.filter(customers, eq(col(1), lit_str("EU"))).unwrap();
    let j = b.join(orders, eu, join_type, eq(col(1), col(3))).unwrap();
    (b.finish(), j)
}

fn classical_only() -> CostModelConfig {
    CostModelConfig {
        semi_join_costing: false,
        ..CostModelConfig::default()
    }
}

#[test]
fn test_semi_join_costing_wins_when_enabled() {
    let (arena, j) = star_join(JoinType::Inner, true);
    let stats = star_stats();

    // dimension keeps 15 of 100 customers:
    // 1000 × (0.1 + 0.15 × 1.0 × 0.9)
    assert_close(rows(&arena, &stats, j), 235.0);
    // classical: 15 × 1000 × 15 / (50 × 15)
    assert_close(rows_with(classical_only(), &arena, &stats, j), 300.0);
}

#[test]
fn test_semi_join_needs_a_unique_dimension_key() {
    let (arena, j) = star_join(JoinType::Inner, false);
    let stats = star_stats();

    let with_semi = rows(&arena, &stats, j);
    let without = rows_with(classical_only(), &arena, &stats, j);
    assert_close(with_semi, without);
}

#[test]
fn test_semi_join_only_applies_to_inner_joins() {
    let (arena, j) = star_join(JoinType::Left, true);
    let stats = star_stats();

    // classical inner 300 plus (1 − 15/50) × 1000 unmatched orders
    assert_close(rows(&arena, &stats, j), 1_000.0);
    assert_close(rows_with(classical_only(), &arena, &stats, j), 1_000.0);
}
