//! Operator tree the estimators run over.
//!
//! Nodes live in a [`PlanArena`] and are addressed by [`NodeId`], so the
//! metadata cache can key on a stable integer instead of object identity.

mod builder;
mod expr;
mod plan;

pub use builder::PlanBuilder;
pub use expr::*;
pub use plan::*;
