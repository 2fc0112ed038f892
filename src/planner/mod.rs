//! Cardinality estimation for the cost-based planner.
//!
//! The plan-search loop owns one [`PlanningSession`] per optimization pass.
//! Each session carries its own metadata cache and cancellation handle;
//! sessions share nothing but the statistics provider.
//!
//! ```text
//! plan search ──► CardinalityEstimator ──► MetadataCache (per session)
//!                    │        ▲
//!          row count │        │ distinct count
//!                    ▼        │
//!                 StatisticsProvider (shared, read-mostly)
//! ```

pub mod cost;
pub mod logical;
mod session;

pub use session::{CancellationHandle, PlanningSession};

use thiserror::Error;

use crate::planner::logical::NodeId;

/// Errors that can occur during planning.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("max metadata call count exceeded: {max} nodes")]
    MaxMetadataCallsExceeded { max: usize },

    #[error("planning session cancelled")]
    Cancelled,

    #[error("unknown plan node {0}")]
    UnknownNode(NodeId),

    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

pub type PlanResult<T> = Result<T, PlanError>;
