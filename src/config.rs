//! Configuration for shardkv
//!
//! Centralized configuration with sensible defaults. `Config` only tunes the
//! engine's internal policy knobs; the storage path and shard count are
//! arguments to [`crate::Db::open`] since they are identity, not policy.

use std::time::Duration;

/// Tunable policy for a [`Db`](crate::Db) instance.
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Memtable / flush configuration
    // -------------------------------------------------------------------------
    /// Number of entries a shard's memtable may hold before a synchronous
    /// flush to a new SSTable is triggered from inside `Set`/`Delete`.
    pub flush_threshold: usize,

    // -------------------------------------------------------------------------
    // Write batcher (group commit) configuration
    // -------------------------------------------------------------------------
    /// Maximum records collected into one flush/fsync.
    pub batch_size: usize,

    /// Maximum time a request may wait in an open batch before it is forced
    /// to flush, even if `batch_size` has not been reached.
    pub flush_interval: Duration,

    /// Bound on the batcher's producer queue; `enqueue_*` applies
    /// backpressure once this many requests are outstanding.
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flush_threshold: 1024,
            batch_size: 128,
            flush_interval: Duration::from_millis(5),
            queue_capacity: 4096,
        }
    }
}

impl Config {
    /// Create a new config builder seeded with [`Config::default`].
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set [`Config::flush_threshold`].
    pub fn flush_threshold(mut self, entries: usize) -> Self {
        self.config.flush_threshold = entries;
        self
    }

    /// Set [`Config::batch_size`].
    pub fn batch_size(mut self, records: usize) -> Self {
        self.config.batch_size = records;
        self
    }

    /// Set [`Config::flush_interval`].
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set [`Config::queue_capacity`].
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Finish building.
    pub fn build(self) -> Config {
        self.config
    }
}
