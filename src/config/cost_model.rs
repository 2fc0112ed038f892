//! Tunables for the cardinality estimators.

use serde::{Deserialize, Serialize};

use super::SettingsError;

/// Every constant the estimators consult, passed explicitly through each
/// estimation call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CostModelConfig {
    /// Multiplier (< 1) applied to a scan filter that only approximates the
    /// user's predicate.
    pub inexact_filter_factor: f64,

    /// Applied when a partition-pruning predicate is present but its effect
    /// cannot be measured.
    pub partition_filter_factor: f64,

    /// An aggregate estimate reaching this fraction of its input is treated
    /// as failed.
    pub aggregate_upper_bound_factor: f64,

    /// Lower clamp for join selectivities in the heuristic paths.
    pub join_selectivity_floor: f64,

    /// Upper clamp for join selectivities in the heuristic paths.
    pub join_selectivity_ceiling: f64,

    /// Scaling used for self-joins under the foreign-key heuristic.
    pub self_join_factor: f64,

    /// Penalty on RIGHT joins with an always-true condition.
    pub right_join_penalty: f64,

    /// Try semi-join costing before the classical NDV formula.
    pub semi_join_costing: bool,

    /// Distinct plan nodes one session may measure.
    pub max_metadata_calls: usize,

    /// Row count for nodes with no statistics and no declared size.
    pub default_row_count: f64,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        Self {
            inexact_filter_factor: 0.9,
            partition_filter_factor: 0.5,
            aggregate_upper_bound_factor: 0.9,
            join_selectivity_floor: 0.1,
            join_selectivity_ceiling: 1.0,
            self_join_factor: 1.5,
            right_join_penalty: 1.05,
            semi_join_costing: true,
            max_metadata_calls: 50_000,
            default_row_count: 100.0,
        }
    }
}

impl CostModelConfig {
    /// Reject factors outside their meaningful ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let unit = [
            ("inexact_filter_factor", self.inexact_filter_factor),
            ("partition_filter_factor", self.partition_filter_factor),
            ("aggregate_upper_bound_factor", self.aggregate_upper_bound_factor),
            ("join_selectivity_floor", self.join_selectivity_floor),
            ("join_selectivity_ceiling", self.join_selectivity_ceiling),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(SettingsError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.join_selectivity_floor > self.join_selectivity_ceiling {
            return Err(SettingsError::InvalidConfig(
                "join_selectivity_floor exceeds join_selectivity_ceiling".to_string(),
            ));
        }
        if self.self_join_factor <= 0.0 || self.right_join_penalty < 1.0 {
            return Err(SettingsError::InvalidConfig(
                "self_join_factor must be positive and right_join_penalty at least 1".to_string(),
            ));
        }
        if self.max_metadata_calls == 0 {
            return Err(SettingsError::InvalidConfig(
                "max_metadata_calls must be positive".to_string(),
            ));
        }
        if !(self.default_row_count >= 0.0) {
            return Err(SettingsError::InvalidConfig(
                "default_row_count must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}
