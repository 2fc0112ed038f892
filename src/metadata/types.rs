//! Statistics data types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Errors a statistics backend may raise. Estimators never propagate these;
/// a failed lookup reads as "unavailable".
#[derive(Debug, thiserror::Error)]
pub enum StatisticsError {
    #[error("statistics backend failure: {0}")]
    Backend(String),

    #[error("failed to read statistics file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse statistics file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for statistics lookups.
pub type StatisticsResult<T> = Result<T, StatisticsError>;

/// Statistics for one table. A missing entry means "unknown", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableStatistics {
    pub row_count: Option<u64>,
    /// Distinct-value count by column name.
    pub ndv: HashMap<String, u64>,
}

impl TableStatistics {
    pub fn with_row_count(row_count: u64) -> Self {
        Self {
            row_count: Some(row_count),
            ndv: HashMap::new(),
        }
    }

    pub fn with_ndv(mut self, column: impl Into<String>, ndv: u64) -> Self {
        self.ndv.insert(column.into(), ndv);
        self
    }
}

/// On-disk layout of a statistics file.
///
/// ```toml
/// [tables.orders]
/// row_count = 100000
///
/// [tables.orders.ndv]
/// customer_id = 5000
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StatisticsFile {
    pub tables: HashMap<String, TableStatistics>,
}
