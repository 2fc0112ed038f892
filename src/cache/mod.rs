//! Per-session metadata cache.
//!
//! Memoizes estimates keyed by `(node, query)` for one planning pass and
//! guards against runaway or cyclic recomputation.
//!
//! # Design
//!
//! - One instance per planning session; never persisted across passes
//! - Every operation runs under a single coarse lock
//! - Each node seen for the first time is charged against a [`CallBudget`];
//!   exhausting it is fatal and cancels the owning session
//! - `InProgress` markers are only kept for search wrappers (placeholders
//!   and vertices), which must short-circuit when revisited
//!
//! # Key Format
//!
//! ```text
//! (#node, RowCount)
//! (#node, DistinctCount { columns: {$0, $2}, predicate: Some(<sha256>) })
//! ```

mod hash;
pub use hash::{compute_hash, predicate_digest};

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::warn;

use crate::planner::logical::{is_trivial, ColumnSet, Expr, NodeId, PlanNode};
use crate::planner::{CancellationHandle, PlanError, PlanResult};

/// Which estimate a cache entry holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryDescriptor {
    RowCount,
    DistinctCount {
        columns: ColumnSet,
        /// Digest of the predicate; `None` for always-true.
        predicate: Option<String>,
    },
}

impl QueryDescriptor {
    pub fn distinct_count(columns: &ColumnSet, predicate: Option<&Expr>) -> Self {
        let predicate = if is_trivial(predicate) {
            None
        } else {
            predicate.map(predicate_digest)
        };
        QueryDescriptor::DistinctCount {
            columns: columns.clone(),
            predicate,
        }
    }
}

/// Cache key: node identity plus query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub node: NodeId,
    pub descriptor: QueryDescriptor,
}

/// State of one cache slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CachedValue {
    NotComputed,
    /// Computation underway. Never a final answer.
    InProgress,
    Value(f64),
}

impl CachedValue {
    pub fn value(self) -> Option<f64> {
        match self {
            CachedValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Counts distinct nodes measured in one session.
#[derive(Debug, Clone)]
pub struct CallBudget {
    seen: HashSet<NodeId>,
    max: usize,
}

impl CallBudget {
    pub fn new(max: usize) -> Self {
        Self {
            seen: HashSet::new(),
            max,
        }
    }

    pub fn used(&self) -> usize {
        self.seen.len()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.seen.contains(&node)
    }

    /// Charge `node` if unseen. The count never exceeds `max`.
    fn charge(&mut self, node: NodeId) -> PlanResult<()> {
        if self.seen.contains(&node) {
            return Ok(());
        }
        if self.seen.len() >= self.max {
            return Err(PlanError::MaxMetadataCallsExceeded { max: self.max });
        }
        self.seen.insert(node);
        Ok(())
    }

    fn reset(&mut self) {
        self.seen.clear();
    }
}

#[derive(Debug)]
struct CacheState {
    entries: HashMap<CacheKey, CachedValue>,
    budget: CallBudget,
}

/// Memo table for one planning session.
#[derive(Debug)]
pub struct MetadataCache {
    state: Mutex<CacheState>,
    cancellation: CancellationHandle,
}

impl MetadataCache {
    pub fn new(max_calls: usize, cancellation: CancellationHandle) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                budget: CallBudget::new(max_calls),
            }),
            cancellation,
        }
    }

    /// Cached state of `(node, descriptor)`; `NotComputed` if never stored.
    pub fn get(&self, node: &PlanNode, descriptor: &QueryDescriptor) -> CachedValue {
        let key = CacheKey {
            node: node.id,
            descriptor: descriptor.clone(),
        };
        let state = self.state.lock();
        state
            .entries
            .get(&key)
            .copied()
            .unwrap_or(CachedValue::NotComputed)
    }

    /// Store `value`, returning the previous slot state.
    ///
    /// The first time a node is seen it is charged against the call budget;
    /// a cancelled session or an exhausted budget fails here, at the node
    /// boundary. `InProgress` is only stored for search wrappers.
    pub fn put(
        &self,
        node: &PlanNode,
        descriptor: QueryDescriptor,
        value: CachedValue,
    ) -> PlanResult<CachedValue> {
        let mut state = self.state.lock();

        if !state.budget.contains(node.id) {
            if self.cancellation.is_cancelled() {
                return Err(PlanError::Cancelled);
            }
            if let Err(e) = state.budget.charge(node.id) {
                warn!(node = %node.id, max = state.budget.max(), "metadata call budget exhausted");
                self.cancellation.cancel();
                return Err(e);
            }
        }

        let skip = match value {
            CachedValue::InProgress => !node.kind.is_search_wrapper(),
            CachedValue::NotComputed => true,
            CachedValue::Value(_) => false,
        };
        let key = CacheKey {
            node: node.id,
            descriptor,
        };
        if skip {
            let previous = state.entries.get(&key).copied();
            return Ok(previous.unwrap_or(CachedValue::NotComputed));
        }

        Ok(state
            .entries
            .insert(key, value)
            .unwrap_or(CachedValue::NotComputed))
    }

    /// Drop the single slot `(node, descriptor)`, returning what it held.
    pub fn forget(&self, node: &PlanNode, descriptor: &QueryDescriptor) -> CachedValue {
        let key = CacheKey {
            node: node.id,
            descriptor: descriptor.clone(),
        };
        self.state
            .lock()
            .entries
            .remove(&key)
            .unwrap_or(CachedValue::NotComputed)
    }

    /// Drop every entry for `node`. Returns true if anything was cached.
    pub fn remove(&self, node: NodeId) -> bool {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| key.node != node);
        state.entries.len() != before
    }

    /// Drop everything, including the call budget.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.budget.reset();
    }

    /// Number of cached slots.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct nodes charged so far.
    pub fn calls(&self) -> usize {
        self.state.lock().budget.used()
    }
}
