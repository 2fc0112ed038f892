//! Tests for row count estimation per operator kind

use cardinal::metadata::{DisabledStatistics, InMemoryStatistics, StatisticsProvider, TableStatistics};
use cardinal::planner::cost::CardinalityEstimator;
use cardinal::planner::logical::{
    and_all, col, eq, gt, lit_bool, lit_int, AggPhase, ColumnSet, NodeId, PlanArena, PlanBuilder,
    ScanFilter, ScanNode, TableRef,
};
use cardinal::planner::PlanningSession;

fn warehouse_stats() -> InMemoryStatistics {
    let stats = InMemoryStatistics::new();
    stats.set_table(
        "sales",
        TableStatistics::with_row_count(1_000)
            .with_ndv("region", 10)
            .with_ndv("channel", 4)
            .with_ndv("customer", 950),
    );
    stats.set_table("regions", TableStatistics::with_row_count(10));
    stats
}

fn sales(b: &mut PlanBuilder) -> NodeId {
    b.scan(TableRef::new("sales"), &["region", "channel", "customer", "amount"])
        .unwrap()
}

fn rows(arena: &PlanArena, stats: &dyn StatisticsProvider, id: NodeId) -> f64 {
    let session = PlanningSession::default();
    CardinalityEstimator::new(arena, &session, stats)
        .row_count(id)
        .unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

// ============================================================================
// Scan
// ============================================================================

#[test]
fn test_scan_uses_table_row_count() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let arena = b.finish();
    assert_close(rows(&arena, &warehouse_stats(), s), 1_000.0);
}

#[test]
fn test_scan_exact_filter_uses_column_ndv() {
    let mut b = PlanBuilder::new();
    let mut scan = ScanNode::new(TableRef::new("sales"), vec!["region".into(), "amount".into()]);
    scan.filter = Some(ScanFilter {
        predicate: eq(col(0), lit_int(3)),
        exact: true,
    });
    let s = b.scan_node(scan).unwrap();
    let arena = b.finish();

    // 1000 × 1/10
    assert_close(rows(&arena, &warehouse_stats(), s), 100.0);
}

#[test]
fn test_inexact_filter_is_discounted() {
    let mut b = PlanBuilder::new();
    let mut exact = ScanNode::new(TableRef::new("sales"), vec!["region".into()]);
    exact.filter = Some(ScanFilter {
        predicate: eq(col(0), lit_int(3)),
        exact: true,
    });
    let mut inexact = exact.clone();
    if let Some(filter) = inexact.filter.as_mut() {
        filter.exact = false;
    }
    let e = b.scan_node(exact).unwrap();
    let i = b.scan_node(inexact).unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    assert!(rows(&arena, &stats, i) < rows(&arena, &stats, e));
    assert_close(rows(&arena, &stats, i), 90.0);
}

#[test]
fn test_scan_without_stats_uses_declared_count() {
    let mut b = PlanBuilder::new();
    let mut scan = ScanNode::new(TableRef::new("sales"), vec!["region".into()]);
    scan.declared_row_count = Some(2_000.0);
    scan.split_ratio = 0.5;
    let s = b.scan_node(scan).unwrap();
    let unknown = b.scan(TableRef::new("other"), &["x"]).unwrap();
    let arena = b.finish();

    // split ratio only applies alongside table statistics
    assert_close(rows(&arena, &DisabledStatistics, s), 2_000.0);
    assert_close(rows(&arena, &DisabledStatistics, unknown), 100.0);
}

#[test]
fn test_missing_table_stats_falls_back() {
    let mut b = PlanBuilder::new();
    let s = b.scan(TableRef::new("unlisted"), &["x"]).unwrap();
    let arena = b.finish();
    assert_close(rows(&arena, &warehouse_stats(), s), 100.0);
}

// ============================================================================
// Filter / Project / pass-through kinds
// ============================================================================

#[test]
fn test_filter_uses_own_estimate() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let f = b.filter(s, gt(col(3), lit_int(10))).unwrap();
    let hinted = b.filter(s, eq(col(0), lit_int(1))).unwrap();
    b.hint(hinted, 7.0).unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    assert_close(rows(&arena, &stats, f), 500.0);
    assert_close(rows(&arena, &stats, hinted), 7.0);
}

#[test]
fn test_project_passes_row_count_through() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let p = b.project(s, vec![(col(1), "channel")]).unwrap();
    b.hint(p, 3.0).unwrap();
    let arena = b.finish();

    // projection never changes cardinality, even against its own hint
    assert_close(rows(&arena, &warehouse_stats(), p), 1_000.0);
}

#[test]
fn test_pass_through_kinds() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let sort = b.sort(s).unwrap();
    let ex = b.exchange(sort, true).unwrap();
    let bridge = b.bridge_reader(ex).unwrap();
    let sub = b.subtree(bridge).unwrap();
    let window = b.window(sub, 2).unwrap();
    let limit = b.limit(window, 0, Some(25)).unwrap();
    let flat = b.flatten(s, ColumnSet::from([3])).unwrap();
    b.hint(flat, 4_000.0).unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    for id in [sort, ex, bridge, sub, window] {
        assert_close(rows(&arena, &stats, id), 1_000.0);
    }
    assert_close(rows(&arena, &stats, limit), 25.0);
    assert_close(rows(&arena, &stats, flat), 4_000.0);
}

#[test]
fn test_row_count_is_never_negative() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let limit = b.limit(s, 5_000, None).unwrap();
    let hinted = b.sort(s).unwrap();
    b.hint(hinted, -12.0).unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    assert_eq!(rows(&arena, &stats, limit), 0.0);
    assert_eq!(rows(&arena, &stats, hinted), 0.0);
}

// ============================================================================
// Aggregate
// ============================================================================

#[test]
fn test_aggregate_from_group_ndv() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let agg = b.aggregate(s, ColumnSet::from([0, 1]), 1).unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &warehouse_stats(), agg), 40.0);
}

#[test]
fn test_rollup_multiplies_by_grouping_sets() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let group = ColumnSet::from([0, 1]);
    let rollup = vec![group.clone(), ColumnSet::from([0]), ColumnSet::new()];
    let agg = b
        .aggregate_with(s, group, rollup, 1, AggPhase::Single)
        .unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &warehouse_stats(), agg), 120.0);
}

#[test]
fn test_aggregate_upper_bound_guard_returns_self_estimate() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    // 950 groups over 1000 rows is not a reducing aggregate
    let hinted = b.aggregate(s, ColumnSet::from([2]), 1).unwrap();
    b.hint(hinted, 300.0).unwrap();
    let unhinted = b.aggregate(s, ColumnSet::from([2]), 1).unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    assert_close(rows(&arena, &stats, hinted), 300.0);
    // default self estimate: 1000 × (1 − 0.5^1)
    assert_close(rows(&arena, &stats, unhinted), 500.0);
}

#[test]
fn test_global_aggregate_without_stats_is_one_row() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let agg = b.aggregate(s, ColumnSet::new(), 2).unwrap();
    let arena = b.finish();

    assert_eq!(rows(&arena, &DisabledStatistics, agg), 1.0);
    assert_eq!(rows(&arena, &warehouse_stats(), agg), 1.0);
}

#[test]
fn test_final_phase_passes_partial_through() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let partial = b
        .aggregate_with(s, ColumnSet::from([0, 1]), Vec::new(), 1, AggPhase::Partial)
        .unwrap();
    b.hint(partial, 64.0).unwrap();
    let last = b
        .aggregate_with(partial, ColumnSet::from([0, 1]), Vec::new(), 1, AggPhase::Final)
        .unwrap();
    let arena = b.finish();
    let stats = warehouse_stats();

    let partial_rows = rows(&arena, &stats, partial);
    assert_close(rows(&arena, &stats, last), partial_rows);
}

// ============================================================================
// Multi-way join list
// ============================================================================

#[test]
fn test_multi_join_cross_product() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let r = b.scan(TableRef::new("regions"), &["id"]).unwrap();
    let cross = b
        .multi_join(vec![s, r], vec![lit_bool(true), and_all(Vec::new())])
        .unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &warehouse_stats(), cross), 10_000.0);
}

#[test]
fn test_multi_join_with_condition_takes_max() {
    let mut b = PlanBuilder::new();
    let s = sales(&mut b);
    let r = b.scan(TableRef::new("regions"), &["id"]).unwrap();
    let joined = b.multi_join(vec![s, r], vec![eq(col(0), col(4))]).unwrap();
    let arena = b.finish();

    assert_close(rows(&arena, &warehouse_stats(), joined), 1_000.0);
}
