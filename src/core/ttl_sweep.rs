use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::Rng;

use crate::constants::{NUM_PARTITIONS, SWEEP_VISIT_FACTOR};
use crate::core::store::KvStore;

/// Configuration for the background expiry sweeper
#[derive(Clone, Debug)]
pub struct TtlConfig {
    /// Number of keys with an expiry to examine per batch
    pub sample_size: usize,
    /// Continue sampling if expiry rate exceeds this threshold (0.0-1.0)
    pub expiry_threshold: f32,
    /// Maximum batches per sweeping run
    pub max_iterations: usize,
    /// Maximum time to spend per sweeping run
    pub max_time_per_run: Duration,
    /// Sleep interval between sweeping runs
    pub sleep_interval: Duration,
    /// Whether the sweeper runs at all
    pub enabled: bool,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            expiry_threshold: 0.25,
            max_iterations: 16,
            max_time_per_run: Duration::from_millis(1),
            sleep_interval: Duration::from_millis(1000),
            enabled: true,
        }
    }
}

/// Background thread that periodically deletes expired keys
pub struct TtlSweeper {
    /// Weak reference to the store to avoid circular references
    store: Weak<KvStore>,
    config: TtlConfig,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    stats: TtlSweeperStats,
}

/// Counters local to one sweeper
#[derive(Clone)]
struct TtlSweeperStats {
    total_sampled: Arc<AtomicU64>,
    total_expired: Arc<AtomicU64>,
    total_runs: Arc<AtomicU64>,
    last_run: Arc<AtomicU64>,
}

impl TtlSweeperStats {
    fn new() -> Self {
        Self {
            total_sampled: Arc::new(AtomicU64::new(0)),
            total_expired: Arc::new(AtomicU64::new(0)),
            total_runs: Arc::new(AtomicU64::new(0)),
            last_run: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl TtlSweeper {
    pub fn new(store: Weak<KvStore>, config: TtlConfig) -> Self {
        Self {
            store,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: None,
            stats: TtlSweeperStats::new(),
        }
    }

    /// Start the background sweeper thread
    pub fn start(&mut self) {
        if !self.config.enabled || self.handle.is_some() {
            return;
        }

        let store = self.store.clone();
        let config = self.config.clone();
        let shutdown = self.shutdown.clone();
        let stats = self.stats.clone();

        self.handle = Some(thread::spawn(move || {
            run_sweeper_loop(store, config, shutdown, stats);
        }));
        debug!("ttl sweeper started");
    }

    /// Stop the background sweeper thread
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        if let Some(handle) = self.handle.take() {
            // The sweeper thread can end up dropping the last store
            // reference itself; it must not wait for its own exit.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Get sweeper statistics
    pub fn stats(&self) -> SweeperSnapshot {
        SweeperSnapshot {
            total_sampled: self.stats.total_sampled.load(Ordering::Relaxed),
            total_expired: self.stats.total_expired.load(Ordering::Relaxed),
            total_runs: self.stats.total_runs.load(Ordering::Relaxed),
            last_run: self.stats.last_run.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TtlSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Snapshot of sweeper statistics
#[derive(Debug, Clone)]
pub struct SweeperSnapshot {
    pub total_sampled: u64,
    pub total_expired: u64,
    pub total_runs: u64,
    pub last_run: u64,
}

fn run_sweeper_loop(
    store: Weak<KvStore>,
    config: TtlConfig,
    shutdown: Arc<AtomicBool>,
    stats: TtlSweeperStats,
) {
    let mut rng = rand::rng();

    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(config.sleep_interval);
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let Some(store) = store.upgrade() else {
            break;
        };

        let start = Instant::now();
        let mut iterations = 0;
        let mut total_sampled = 0;
        let mut total_expired = 0;

        loop {
            // Each batch starts at a random partition so repeated runs do
            // not keep revisiting the same keys.
            let first_partition = rng.random_range(0..NUM_PARTITIONS);
            let max_visited = config.sample_size.saturating_mul(SWEEP_VISIT_FACTOR);
            let (sampled, expired) = match store.sweep_expired_batch(
                config.sample_size,
                max_visited,
                first_partition,
            ) {
                Ok(counts) => counts,
                Err(e) => {
                    warn!("ttl sweep failed: {}", e);
                    break;
                }
            };
            total_sampled += sampled;
            total_expired += expired;
            iterations += 1;

            let expiry_rate = if sampled > 0 {
                expired as f32 / sampled as f32
            } else {
                0.0
            };

            if expiry_rate < config.expiry_threshold {
                break;
            }
            if iterations >= config.max_iterations {
                break;
            }
            if start.elapsed() > config.max_time_per_run {
                break;
            }
        }

        store.stats_hub().record_sweeper_run();
        if total_sampled > 0 {
            stats
                .total_sampled
                .fetch_add(total_sampled, Ordering::Relaxed);
            stats
                .total_expired
                .fetch_add(total_expired, Ordering::Relaxed);
            stats.total_runs.fetch_add(1, Ordering::Relaxed);
            stats.last_run.store(store.now(), Ordering::Relaxed);
        }
    }
}
