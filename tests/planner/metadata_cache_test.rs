//! Tests for the per-session metadata cache and call budget

use cardinal::cache::{CachedValue, MetadataCache, QueryDescriptor};
use cardinal::config::CostModelConfig;
use cardinal::metadata::DisabledStatistics;
use cardinal::planner::cost::CardinalityEstimator;
use cardinal::planner::logical::{ColumnSet, NodeId, PlanArena, PlanBuilder, PlanNode, TableRef};
use cardinal::planner::{CancellationHandle, PlanError, PlanningSession};
use insta::assert_snapshot;

/// A chain of `n` sorts over one scan.
fn sort_chain(n: usize) -> PlanArena {
    let mut b = PlanBuilder::new();
    let mut id = b.scan(TableRef::new("t"), &["a", "b"]).unwrap();
    for _ in 0..n {
        id = b.sort(id).unwrap();
    }
    b.finish()
}

fn node(arena: &PlanArena, id: u32) -> &PlanNode {
    arena.node(NodeId(id)).unwrap()
}

#[test]
fn test_put_then_get_is_idempotent() {
    let arena = sort_chain(1);
    let cache = MetadataCache::new(10, CancellationHandle::new());
    let scan = node(&arena, 0);
    let key = QueryDescriptor::distinct_count(&ColumnSet::from([0, 1]), None);

    cache.put(scan, key.clone(), CachedValue::Value(12.0)).unwrap();
    assert_eq!(cache.get(scan, &key), CachedValue::Value(12.0));
    assert_eq!(cache.get(scan, &key), CachedValue::Value(12.0));

    // overwrite is deterministic and visible
    let prev = cache.put(scan, key.clone(), CachedValue::Value(3.0)).unwrap();
    assert_eq!(prev, CachedValue::Value(12.0));
    assert_eq!(cache.get(scan, &key), CachedValue::Value(3.0));
}

#[test]
fn test_column_order_does_not_matter() {
    let arena = sort_chain(1);
    let cache = MetadataCache::new(10, CancellationHandle::new());
    let scan = node(&arena, 0);

    let a: ColumnSet = [1, 0].into_iter().collect();
    let b = ColumnSet::from([0, 1]);
    cache
        .put(scan, QueryDescriptor::distinct_count(&a, None), CachedValue::Value(5.0))
        .unwrap();
    assert_eq!(
        cache.get(scan, &QueryDescriptor::distinct_count(&b, None)),
        CachedValue::Value(5.0)
    );
}

#[test]
fn test_budget_saturation_is_fatal_and_keeps_entries() {
    let arena = sort_chain(3);
    let handle = CancellationHandle::new();
    let cache = MetadataCache::new(3, handle.clone());

    for id in 0..3 {
        cache
            .put(node(&arena, id), QueryDescriptor::RowCount, CachedValue::Value(id as f64))
            .unwrap();
    }
    assert_eq!(cache.calls(), 3);

    // revisiting a known node is free
    cache
        .put(node(&arena, 1), QueryDescriptor::RowCount, CachedValue::Value(7.0))
        .unwrap();

    let err = cache
        .put(node(&arena, 3), QueryDescriptor::RowCount, CachedValue::Value(1.0))
        .unwrap_err();
    assert!(matches!(err, PlanError::MaxMetadataCallsExceeded { max: 3 }));
    assert_snapshot!(err.to_string(), @"max metadata call count exceeded: 3 nodes");
    assert!(handle.is_cancelled());
    assert_eq!(cache.calls(), 3);

    assert_eq!(cache.get(node(&arena, 0), &QueryDescriptor::RowCount), CachedValue::Value(0.0));
    assert_eq!(cache.get(node(&arena, 1), &QueryDescriptor::RowCount), CachedValue::Value(7.0));
    assert_eq!(cache.get(node(&arena, 3), &QueryDescriptor::RowCount), CachedValue::NotComputed);
}

#[test]
fn test_cancelled_session_rejects_new_nodes() {
    let arena = sort_chain(1);
    let handle = CancellationHandle::new();
    let cache = MetadataCache::new(10, handle.clone());
    cache
        .put(node(&arena, 0), QueryDescriptor::RowCount, CachedValue::Value(1.0))
        .unwrap();

    handle.cancel();
    let err = cache
        .put(node(&arena, 1), QueryDescriptor::RowCount, CachedValue::Value(1.0))
        .unwrap_err();
    assert!(matches!(err, PlanError::Cancelled));
    // nodes already measured can still be updated
    cache
        .put(node(&arena, 0), QueryDescriptor::RowCount, CachedValue::Value(2.0))
        .unwrap();
}

#[test]
fn test_estimator_aborts_when_budget_runs_out() {
    let arena = sort_chain(10);
    let config = CostModelConfig {
        max_metadata_calls: 5,
        ..CostModelConfig::default()
    };
    let session = PlanningSession::new(config);
    let estimator = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);

    let root = arena.root().unwrap();
    let err = estimator.row_count(root).unwrap_err();
    assert!(matches!(err, PlanError::MaxMetadataCallsExceeded { max: 5 }));
    assert!(session.is_cancelled());
    assert_eq!(session.cache().calls(), 5);

    // the pass is over; further lookups fail fast
    let err = estimator.row_count(NodeId(0)).unwrap_err();
    assert!(matches!(err, PlanError::Cancelled));
}

#[test]
fn test_reset_starts_a_fresh_pass() {
    let arena = sort_chain(2);
    let session = PlanningSession::default();
    let estimator = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);

    estimator.row_count(arena.root().unwrap()).unwrap();
    assert_eq!(session.cache().calls(), 3);
    assert!(!session.cache().is_empty());

    session.reset();
    assert!(session.cache().is_empty());
    assert_eq!(session.cache().calls(), 0);
}

#[test]
fn test_reset_after_budget_exhaustion() {
    let arena = sort_chain(5);
    let config = CostModelConfig {
        max_metadata_calls: 3,
        ..CostModelConfig::default()
    };
    let session = PlanningSession::new(config);
    let estimator = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);

    let err = estimator.row_count(arena.root().unwrap()).unwrap_err();
    assert!(matches!(err, PlanError::MaxMetadataCallsExceeded { max: 3 }));
    assert!(session.is_cancelled());

    session.reset();
    assert!(!session.is_cancelled());
    // a short chain fits the fresh budget
    assert_eq!(estimator.row_count(NodeId(2)).unwrap(), 100.0);
    assert_eq!(session.cache().calls(), 3);
}

#[test]
fn test_remove_invalidates_one_node() {
    let arena = sort_chain(1);
    let session = PlanningSession::default();
    let estimator = CardinalityEstimator::new(&arena, &session, &DisabledStatistics);
    let sort = arena.root().unwrap();

    estimator.row_count(sort).unwrap();
    estimator.distinct_count(sort, &ColumnSet::from([0]), None).unwrap();
    assert!(session.cache().remove(sort));
    assert_eq!(
        session.cache().get(node(&arena, 1), &QueryDescriptor::RowCount),
        CachedValue::NotComputed
    );
    assert_eq!(
        session.cache().get(node(&arena, 0), &QueryDescriptor::RowCount),
        CachedValue::Value(100.0)
    );
}
