use std::sync::Arc;
use std::time::Duration;

use crate::constants::*;
use crate::core::ttl_sweep::TtlConfig;
use crate::error::Result;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::hash::HashFunction;

use super::KvStore;

/// Configuration options for KvStore.
///
/// Use `StoreBuilder` for a more ergonomic way to configure the store.
/// Arena capacity, bucket count and hash function only take effect when
/// the namespace is created; stores opening an existing namespace inherit
/// whatever it was created with.
#[derive(Clone)]
pub struct StoreConfig {
    pub namespace: String,
    pub arena_capacity: usize,
    pub initial_buckets_log2: u32,
    pub hash_function: HashFunction,
    pub max_load_percent: u32,
    pub keep_attached: bool,
    pub ttl_sweeper: Option<TtlConfig>,
    pub clock: Arc<dyn Clock>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            arena_capacity: DEFAULT_ARENA_CAPACITY,
            initial_buckets_log2: DEFAULT_BUCKETS_LOG2,
            hash_function: HashFunction::Default,
            max_load_percent: DEFAULT_MAX_LOAD_PERCENT,
            keep_attached: false,
            ttl_sweeper: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("namespace", &self.namespace)
            .field("arena_capacity", &self.arena_capacity)
            .field("initial_buckets_log2", &self.initial_buckets_log2)
            .field("hash_function", &self.hash_function)
            .field("max_load_percent", &self.max_load_percent)
            .field("keep_attached", &self.keep_attached)
            .field("ttl_sweeper", &self.ttl_sweeper)
            .finish_non_exhaustive()
    }
}

/// Builder for creating KvStore with custom configuration.
///
/// Provides a fluent interface for configuring store parameters.
///
/// # Example
///
/// ```rust
/// use arenakv::{HashFunction, KvStore};
///
/// # fn main() -> arenakv::Result<()> {
/// let store = KvStore::builder()
///     .namespace("sessions")
///     .arena_capacity(16 * 1024 * 1024)
///     .hash_function(HashFunction::Murmur3)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct StoreBuilder {
    config: StoreConfig,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    /// Select the namespace the store operates on.
    ///
    /// Stores built with the same namespace share all their data.
    /// Default: "arenakv-default"
    pub fn namespace(mut self, name: impl Into<String>) -> Self {
        self.config.namespace = name.into();
        self
    }

    /// Set the arena size (in bytes) used if the namespace has to be created.
    ///
    /// Default: 64MB
    pub fn arena_capacity(mut self, bytes: usize) -> Self {
        self.config.arena_capacity = bytes;
        self
    }

    /// Set the initial number of top-level buckets as a power of two.
    ///
    /// Values below 7 are rejected at build time since every one of the
    /// 128 lock partitions needs at least one bucket.
    /// Default: 7 (128 buckets)
    pub fn initial_buckets_log2(mut self, bits: u32) -> Self {
        self.config.initial_buckets_log2 = bits;
        self
    }

    /// Choose the hash function for indexes created by this store.
    pub fn hash_function(mut self, hash_function: HashFunction) -> Self {
        self.config.hash_function = hash_function;
        self
    }

    /// Grow an index once a partition holds more than this percentage of
    /// entries per bucket.
    ///
    /// Default: 75
    pub fn max_load_percent(mut self, percent: u32) -> Self {
        self.config.max_load_percent = percent;
        self
    }

    /// Keep the arena attached between commands instead of detaching after
    /// each one.
    pub fn keep_attached(mut self, keep: bool) -> Self {
        self.config.keep_attached = keep;
        self
    }

    /// Enable or disable the background expiry sweeper.
    ///
    /// When disabled (default), expiry times are recorded and reported but
    /// nothing deletes expired keys.
    pub fn enable_ttl_sweeper(mut self, enable: bool) -> Self {
        if enable {
            let mut config = self.config.ttl_sweeper.unwrap_or_default();
            config.enabled = true;
            self.config.ttl_sweeper = Some(config);
        } else {
            self.config.ttl_sweeper = None;
        }
        self
    }

    /// Configure the expiry sweeper with custom parameters.
    ///
    /// # Arguments
    ///
    /// * `sample_size` - Keys with an expiry to check per batch
    /// * `threshold` - Continue if >threshold expired (0.0-1.0)
    /// * `max_time_ms` - Max milliseconds per sweeping run
    /// * `interval_ms` - Sleep between runs
    pub fn ttl_sweeper_config(
        mut self,
        sample_size: usize,
        threshold: f32,
        max_time_ms: u64,
        interval_ms: u64,
    ) -> Self {
        self.config.ttl_sweeper = Some(TtlConfig {
            sample_size,
            expiry_threshold: threshold,
            max_iterations: 16,
            max_time_per_run: Duration::from_millis(max_time_ms),
            sleep_interval: Duration::from_millis(interval_ms),
            enabled: true,
        });
        self
    }

    /// Use a custom time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.config.clock = clock;
        self
    }

    /// Build the KvStore
    pub fn build(self) -> Result<KvStore> {
        KvStore::with_config(self.config)
    }

    /// Build a shared KvStore and start its expiry sweeper, if configured.
    pub fn build_shared(self) -> Result<Arc<KvStore>> {
        let store = Arc::new(self.build()?);
        store.start_ttl_sweeper();
        Ok(store)
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
