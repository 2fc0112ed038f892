//! In-memory StatisticsProvider backed by a concurrent map.

use std::fs;
use std::path::Path;

use dashmap::DashMap;

use super::provider::StatisticsProvider;
use super::types::{StatisticsFile, StatisticsResult, TableStatistics};

/// Statistics held in memory, safe to share across planning sessions.
#[derive(Debug, Default)]
pub struct InMemoryStatistics {
    tables: DashMap<String, TableStatistics>,
}

impl InMemoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML statistics file body.
    pub fn from_toml_str(content: &str) -> StatisticsResult<Self> {
        let file: StatisticsFile = toml::from_str(content)?;
        let stats = Self::new();
        for (name, table) in file.tables {
            stats.set_table(name, table);
        }
        Ok(stats)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> StatisticsResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn set_table(&self, table: impl Into<String>, stats: TableStatistics) {
        self.tables.insert(table.into(), stats);
    }

    pub fn set_row_count(&self, table: &str, rows: u64) {
        self.tables.entry(table.to_string()).or_default().row_count = Some(rows);
    }

    pub fn set_ndv(&self, table: &str, column: &str, ndv: u64) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .ndv
            .insert(column.to_string(), ndv);
    }

    pub fn remove_table(&self, table: &str) -> bool {
        self.tables.remove(table).is_some()
    }

    pub fn table(&self, table: &str) -> Option<TableStatistics> {
        self.tables.get(table).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl StatisticsProvider for InMemoryStatistics {
    fn get_row_count(&self, table: &str) -> StatisticsResult<Option<u64>> {
        Ok(self.tables.get(table).and_then(|t| t.row_count))
    }

    fn get_ndv(&self, column: &str, table: &str) -> StatisticsResult<Option<u64>> {
        Ok(self
            .tables
            .get(table)
            .and_then(|t| t.ndv.get(column).copied()))
    }
}
