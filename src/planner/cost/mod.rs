//! Cardinality estimation: output row counts and distinct-value counts.
//!
//! Both estimators recurse into each other and into their inputs; every
//! sub-query goes through the session's [`MetadataCache`] first.
//!
//! [`MetadataCache`]: crate::cache::MetadataCache

mod distinct;
mod estimator;
mod join;
mod origin;
mod row_count;
mod selectivity;

pub use estimator::CardinalityEstimator;
pub use join::JoinKeys;
pub use origin::ColumnOrigin;
pub use selectivity::{
    decay_distinct, filtered_ndv, guess_selectivity, num_distinct_vals, sanitize,
    NDV_DECAY_BASE,
};
