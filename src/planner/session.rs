//! One optimization pass: config, metadata cache and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::config::CostModelConfig;

/// Cancellation handle that can be used from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Lower the flag for every clone.
    pub(crate) fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

/// State scoped to a single planning pass. Dropped (or [`reset`]) when the
/// pass ends; nothing here outlives it.
///
/// [`reset`]: PlanningSession::reset
#[derive(Debug)]
pub struct PlanningSession {
    config: CostModelConfig,
    cache: MetadataCache,
    cancellation: CancellationHandle,
}

impl PlanningSession {
    pub fn new(config: CostModelConfig) -> Self {
        let cancellation = CancellationHandle::new();
        let cache = MetadataCache::new(config.max_metadata_calls, cancellation.clone());
        Self {
            config,
            cache,
            cancellation,
        }
    }

    pub fn config(&self) -> &CostModelConfig {
        &self.config
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Start an independent pass: cached estimates, the call budget and
    /// any cancellation are discarded.
    pub fn reset(&self) {
        self.cache.clear();
        self.cancellation.reset();
    }
}

impl Default for PlanningSession {
    fn default() -> Self {
        Self::new(CostModelConfig::default())
    }
}
