use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::entry::ValueKind;
use crate::error::KvError;

/// Operation counters for one namespace, shared by every store attached
/// to it.
#[derive(Debug)]
pub struct Statistics {
    // Key/value operations
    pub total_gets: AtomicU64,
    pub get_hits: AtomicU64,
    pub get_misses: AtomicU64,
    pub total_inserts: AtomicU64,
    pub total_updates: AtomicU64,
    pub total_deletes: AtomicU64,
    pub total_scans: AtomicU64,

    // Collection operations
    pub set_ops: AtomicU64,
    pub list_ops: AtomicU64,
    pub hash_ops: AtomicU64,

    // Operation latencies (in nanoseconds)
    pub get_latency_ns: AtomicU64,
    pub insert_latency_ns: AtomicU64,
    pub delete_latency_ns: AtomicU64,
    pub collection_latency_ns: AtomicU64,

    // Error counters
    pub wrong_type_errors: AtomicU64,
    pub out_of_memory_errors: AtomicU64,
    pub corruption_errors: AtomicU64,

    // TTL metrics
    pub ttl_expired_active: AtomicU64, // Keys removed by the sweeper
    pub ttl_sweeper_runs: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Self {
            total_gets: AtomicU64::new(0),
            get_hits: AtomicU64::new(0),
            get_misses: AtomicU64::new(0),
            total_inserts: AtomicU64::new(0),
            total_updates: AtomicU64::new(0),
            total_deletes: AtomicU64::new(0),
            total_scans: AtomicU64::new(0),

            set_ops: AtomicU64::new(0),
            list_ops: AtomicU64::new(0),
            hash_ops: AtomicU64::new(0),

            get_latency_ns: AtomicU64::new(0),
            insert_latency_ns: AtomicU64::new(0),
            delete_latency_ns: AtomicU64::new(0),
            collection_latency_ns: AtomicU64::new(0),

            wrong_type_errors: AtomicU64::new(0),
            out_of_memory_errors: AtomicU64::new(0),
            corruption_errors: AtomicU64::new(0),

            ttl_expired_active: AtomicU64::new(0),
            ttl_sweeper_runs: AtomicU64::new(0),
        }
    }

    /// Record a get operation
    pub fn record_get(&self, latency_ns: u64, hit: bool) {
        self.total_gets.fetch_add(1, Ordering::Relaxed);
        self.get_latency_ns.fetch_add(latency_ns, Ordering::Relaxed);

        if hit {
            self.get_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.get_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a string write
    pub fn record_insert(&self, latency_ns: u64, is_update: bool) {
        if is_update {
            self.total_updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_inserts.fetch_add(1, Ordering::Relaxed);
        }
        self.insert_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
    }

    /// Record a delete operation
    pub fn record_delete(&self, latency_ns: u64) {
        self.total_deletes.fetch_add(1, Ordering::Relaxed);
        self.delete_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
    }

    /// Record a set, list or hash command
    pub fn record_collection_op(&self, kind: ValueKind, latency_ns: u64) {
        let counter = match kind {
            ValueKind::Set => &self.set_ops,
            ValueKind::List => &self.list_ops,
            ValueKind::Hash => &self.hash_ops,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.collection_latency_ns
            .fetch_add(latency_ns, Ordering::Relaxed);
    }

    pub fn record_scan(&self) {
        self.total_scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.ttl_expired_active.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_sweeper_run(&self) {
        self.ttl_sweeper_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record errors
    pub fn record_error(&self, error: &KvError) {
        match error {
            KvError::WrongType { .. } => {
                self.wrong_type_errors.fetch_add(1, Ordering::Relaxed);
            }
            KvError::OutOfMemory { .. } => {
                self.out_of_memory_errors.fetch_add(1, Ordering::Relaxed);
            }
            e if e.is_corruption() => {
                self.corruption_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self) -> StatsSnapshot {
        let total_gets = self.total_gets.load(Ordering::Relaxed);
        let total_inserts = self.total_inserts.load(Ordering::Relaxed);
        let total_updates = self.total_updates.load(Ordering::Relaxed);
        let total_deletes = self.total_deletes.load(Ordering::Relaxed);
        let set_ops = self.set_ops.load(Ordering::Relaxed);
        let list_ops = self.list_ops.load(Ordering::Relaxed);
        let hash_ops = self.hash_ops.load(Ordering::Relaxed);
        let collection_ops = set_ops + list_ops + hash_ops;

        let average = |total_ns: &AtomicU64, count: u64| {
            if count > 0 {
                total_ns.load(Ordering::Relaxed) / count
            } else {
                0
            }
        };

        StatsSnapshot {
            record_count: 0,
            memory_usage: 0,
            total_operations: total_gets
                + total_inserts
                + total_updates
                + total_deletes
                + collection_ops,
            total_gets,
            get_hits: self.get_hits.load(Ordering::Relaxed),
            get_misses: self.get_misses.load(Ordering::Relaxed),
            total_inserts,
            total_updates,
            total_deletes,
            total_scans: self.total_scans.load(Ordering::Relaxed),
            set_ops,
            list_ops,
            hash_ops,
            avg_get_latency_ns: average(&self.get_latency_ns, total_gets),
            avg_insert_latency_ns: average(&self.insert_latency_ns, total_inserts + total_updates),
            avg_delete_latency_ns: average(&self.delete_latency_ns, total_deletes),
            avg_collection_latency_ns: average(&self.collection_latency_ns, collection_ops),
            wrong_type_errors: self.wrong_type_errors.load(Ordering::Relaxed),
            out_of_memory_errors: self.out_of_memory_errors.load(Ordering::Relaxed),
            corruption_errors: self.corruption_errors.load(Ordering::Relaxed),
            ttl_expired_active: self.ttl_expired_active.load(Ordering::Relaxed),
            ttl_sweeper_runs: self.ttl_sweeper_runs.load(Ordering::Relaxed),
        }
    }

    /// Reset all statistics
    pub fn reset(&self) {
        for counter in [
            &self.total_gets,
            &self.get_hits,
            &self.get_misses,
            &self.total_inserts,
            &self.total_updates,
            &self.total_deletes,
            &self.total_scans,
            &self.set_ops,
            &self.list_ops,
            &self.hash_ops,
            &self.get_latency_ns,
            &self.insert_latency_ns,
            &self.delete_latency_ns,
            &self.collection_latency_ns,
            &self.wrong_type_errors,
            &self.out_of_memory_errors,
            &self.corruption_errors,
            &self.ttl_expired_active,
            &self.ttl_sweeper_runs,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of statistics at a point in time
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    // Namespace metrics
    pub record_count: usize,
    pub memory_usage: usize,

    // Operations
    pub total_operations: u64,
    pub total_gets: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub total_inserts: u64,
    pub total_updates: u64,
    pub total_deletes: u64,
    pub total_scans: u64,
    pub set_ops: u64,
    pub list_ops: u64,
    pub hash_ops: u64,

    // Latencies (nanoseconds)
    pub avg_get_latency_ns: u64,
    pub avg_insert_latency_ns: u64,
    pub avg_delete_latency_ns: u64,
    pub avg_collection_latency_ns: u64,

    // Errors
    pub wrong_type_errors: u64,
    pub out_of_memory_errors: u64,
    pub corruption_errors: u64,

    // TTL
    pub ttl_expired_active: u64,
    pub ttl_sweeper_runs: u64,
}

impl StatsSnapshot {
    /// Format statistics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "=== arenakv Statistics ===\n\
            Namespace:\n\
            - Keys: {}\n\
            - Arena used: {:.2} MB\n\n\
            Operations:\n\
            - Total: {}\n\
            - Gets: {} (hits: {}, misses: {}, avg latency: {:.2}μs)\n\
            - Inserts: {} (avg latency: {:.2}μs)\n\
            - Updates: {}\n\
            - Deletes: {} (avg latency: {:.2}μs)\n\
            - Scans: {}\n\n\
            Collections (avg latency: {:.2}μs):\n\
            - Set: {}\n\
            - List: {}\n\
            - Hash: {}\n\n\
            Expiry:\n\
            - Swept: {}\n\
            - Sweeper Runs: {}\n\n\
            Errors:\n\
            - Wrong Type: {}\n\
            - Out of Memory: {}\n\
            - Corruption: {}",
            self.record_count,
            self.memory_usage as f64 / 1_048_576.0,
            self.total_operations,
            self.total_gets,
            self.get_hits,
            self.get_misses,
            self.avg_get_latency_ns as f64 / 1000.0,
            self.total_inserts,
            self.avg_insert_latency_ns as f64 / 1000.0,
            self.total_updates,
            self.total_deletes,
            self.avg_delete_latency_ns as f64 / 1000.0,
            self.total_scans,
            self.avg_collection_latency_ns as f64 / 1000.0,
            self.set_ops,
            self.list_ops,
            self.hash_ops,
            self.ttl_expired_active,
            self.ttl_sweeper_runs,
            self.wrong_type_errors,
            self.out_of_memory_errors,
            self.corruption_errors
        )
    }
}
