//! Configuration for the sync engine.

use std::cmp::Ordering;

/// Compares two last-modified timestamps.
pub type TimestampOrder = fn(&str, &str) -> Ordering;

/// Default batch size for ID-diff backfill requests.
pub const DEFAULT_ID_BATCH_SIZE: usize = 200;

/// Largest delta set the backend is expected to return.
pub const DEFAULT_MAX_DELTA_SET_SIZE: usize = 10_000;

/// How incremental fetches discover changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaStrategy {
    /// Ask the backend's delta-set endpoint for changes since the cursor.
    #[default]
    ServerDeltaSet,
    /// Fetch IDs and timestamps, diff against the cache, then fetch the
    /// changed entities by ID.
    IdDiff,
}

/// Configuration for read and sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Whether network finds may fetch incrementally.
    pub delta_set_fetching: bool,
    /// Incremental fetch strategy.
    pub delta_strategy: DeltaStrategy,
    /// Maximum IDs per backfill request in the ID-diff strategy.
    pub id_batch_size: usize,
    /// Advisory delta-set size limit, used only for diagnostics.
    pub max_delta_set_size: usize,
    /// Order on last-modified timestamps.
    pub timestamp_order: TimestampOrder,
}

impl SyncConfig {
    /// Creates a configuration with delta-set fetching disabled.
    pub fn new() -> Self {
        Self {
            delta_set_fetching: false,
            delta_strategy: DeltaStrategy::ServerDeltaSet,
            id_batch_size: DEFAULT_ID_BATCH_SIZE,
            max_delta_set_size: DEFAULT_MAX_DELTA_SET_SIZE,
            timestamp_order: lexical_order,
        }
    }

    /// Enables or disables delta-set fetching.
    pub fn with_delta_set_fetching(mut self, enabled: bool) -> Self {
        self.delta_set_fetching = enabled;
        self
    }

    /// Sets the incremental fetch strategy.
    pub fn with_delta_strategy(mut self, strategy: DeltaStrategy) -> Self {
        self.delta_strategy = strategy;
        self
    }

    /// Sets the backfill batch size. Zero is treated as one.
    pub fn with_id_batch_size(mut self, size: usize) -> Self {
        self.id_batch_size = size.max(1);
        self
    }

    /// Sets the advisory delta-set size limit.
    pub fn with_max_delta_set_size(mut self, size: usize) -> Self {
        self.max_delta_set_size = size;
        self
    }

    /// Sets the timestamp order.
    pub fn with_timestamp_order(mut self, order: TimestampOrder) -> Self {
        self.timestamp_order = order;
        self
    }

    /// Returns true if `candidate` is strictly newer than `current`.
    pub fn is_newer(&self, candidate: &str, current: &str) -> bool {
        (self.timestamp_order)(candidate, current) == Ordering::Greater
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain string comparison. Correct for fixed-width ISO-8601 timestamps.
pub fn lexical_order(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}
