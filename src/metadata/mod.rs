//! Statistics provider module.
//!
//! The estimators read optional per-table row counts and per-column NDVs
//! through [`StatisticsProvider`]. Statistics collection, refresh and
//! storage live outside this crate.
//!
//! # Example
//!
//! ```
//! use cardinal::metadata::{InMemoryStatistics, StatisticsProvider, TableStatistics};
//!
//! let stats = InMemoryStatistics::new();
//! stats.set_table("orders", TableStatistics::with_row_count(1_000).with_ndv("status", 4));
//!
//! assert_eq!(stats.get_ndv("status", "orders").unwrap(), Some(4));
//! assert_eq!(stats.get_ndv("missing", "orders").unwrap(), None);
//! ```

mod memory;
mod provider;
mod types;

pub use memory::InMemoryStatistics;
pub use provider::{DisabledStatistics, StatisticsProvider, StatisticsProviderExt};
pub use types::*;
