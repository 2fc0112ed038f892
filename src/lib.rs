//! # Cardinal
//!
//! Cardinality estimation for a cost-based SQL optimizer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Plan search (external, per optimization pass)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │ row_count / distinct_count
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   CardinalityEstimator (planner::cost)                   │
//! │   row count ⇄ distinct count, per operator kind          │
//! └─────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//! ┌──────────────────────────┐   ┌──────────────────────────┐
//! │ MetadataCache (cache)     │   │ StatisticsProvider        │
//! │ one per PlanningSession   │   │ (metadata), shared        │
//! └──────────────────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use cardinal::metadata::{InMemoryStatistics, TableStatistics};
//! use cardinal::planner::cost::CardinalityEstimator;
//! use cardinal::planner::logical::{col, eq, JoinType, PlanBuilder, TableRef};
//! use cardinal::planner::PlanningSession;
//!
//! let stats = InMemoryStatistics::new();
//! stats.set_table("l", TableStatistics::with_row_count(100).with_ndv("k", 10));
//! stats.set_table("r", TableStatistics::with_row_count(200).with_ndv("k", 10));
//!
//! let mut b = PlanBuilder::new();
//! let l = b.scan(TableRef::new("l"), &["k"]).unwrap();
//! let r = b.scan(TableRef::new("r"), &["k"]).unwrap();
//! let join = b.join(l, r, JoinType::Inner, eq(col(0), col(1))).unwrap();
//! let arena = b.finish();
//!
//! let session = PlanningSession::default();
//! let estimator = CardinalityEstimator::new(&arena, &session, &stats);
//! assert_eq!(estimator.row_count(join).unwrap(), 2000.0);
//! ```

pub mod cache;
pub mod config;
pub mod metadata;
pub mod planner;

pub use config::{CostModelConfig, Settings};
pub use planner::cost::CardinalityEstimator;
pub use planner::{PlanError, PlanResult, PlanningSession};
