use parking_lot::RwLock;
use std::sync::Arc;

use crate::core::database::Database;
use crate::core::index::IndexParams;
use crate::core::ttl_sweep::{TtlConfig, TtlSweeper};
use crate::error::Result;
use crate::utils::clock::Clock;

// Re-export public types
pub use self::builder::{StoreBuilder, StoreConfig};
pub use self::strings::{SetCondition, SetOptions};

// Module declarations
pub mod builder;
pub mod hashes;
pub mod init;
pub mod internal;
pub mod keyspace;
pub mod lists;
pub mod sets;
pub mod strings;
pub mod ttl;

/// Redis-style key-value store over one shared namespace.
///
/// `KvStore` is the command layer: every method attaches to the namespace's
/// arena, runs one operation on the top-level index (and the nested index
/// or list under the key, if any), and detaches again. Any number of stores,
/// in any number of threads, may target the same namespace; they all see
/// the same data.
///
/// # Thread Safety
///
/// All methods take `&self` and are safe to call concurrently.
///
/// # Locking
///
/// A command holds the lock on its key's partition for its whole duration,
/// shared for reads and exclusive for writes. Set and hash commands take the
/// nested index's locks only while holding that top-level lock, so the
/// order is always top-level first.
pub struct KvStore {
    pub(super) db: Database,

    // Time source for expiry and creation stamps
    pub(super) clock: Arc<dyn Clock>,

    // Parameters for set and hash indexes created by this store
    pub(super) nested_params: IndexParams,

    // TTL sweeper (if enabled)
    pub(super) ttl_config: Option<TtlConfig>,
    pub(super) ttl_sweeper: RwLock<Option<TtlSweeper>>,
}

impl KvStore {
    /// Create a builder for configuring KvStore.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arenakv::KvStore;
    ///
    /// # fn main() -> arenakv::Result<()> {
    /// let store = KvStore::builder()
    ///     .namespace("doc-builder")
    ///     .arena_capacity(8 * 1024 * 1024)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Get the number of keys in the namespace
    pub fn len(&self) -> Result<usize> {
        let attachment = self.db.attach()?;
        Ok(attachment.index().len())
    }

    /// Check if the namespace holds no keys
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes of arena memory held by live allocations.
    pub fn memory_usage(&self) -> Result<usize> {
        let attachment = self.db.attach()?;
        Ok(attachment.arena().stats().used_bytes)
    }

    /// Get statistics snapshot
    pub fn stats(&self) -> Result<crate::stats::StatsSnapshot> {
        let attachment = self.db.attach()?;
        let mut snapshot = self.db.stats().snapshot();
        snapshot.record_count = attachment.index().len();
        snapshot.memory_usage = attachment.arena().stats().used_bytes;
        Ok(snapshot)
    }

    /// Name of the namespace, as recorded in its arena.
    pub fn name(&self) -> Result<String> {
        self.db.name()
    }

    /// Creation time of the namespace, in clock nanoseconds.
    pub fn created_at(&self) -> u64 {
        self.db.created_at()
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
