//! Configuration module for Cardinal.
//!
//! Handles estimator tunables, statistics settings, and environment variables.

mod cost_model;
mod settings;

pub use cost_model::CostModelConfig;
pub use settings::{expand_env_vars, Settings, SettingsError, StatisticsSettings};
