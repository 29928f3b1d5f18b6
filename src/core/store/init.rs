use parking_lot::RwLock;

use crate::constants::*;
use crate::core::database::{Database, DatabaseOptions};
use crate::core::index::IndexParams;
use crate::error::{KvError, Result};

use super::{KvStore, StoreConfig};

impl KvStore {
    /// Open the namespace `namespace` with default configuration,
    /// creating it on first use.
    pub fn new(namespace: &str) -> Result<Self> {
        Self::with_config(StoreConfig {
            namespace: namespace.to_string(),
            ..StoreConfig::default()
        })
    }

    /// Create a new KvStore with custom configuration
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        if config.namespace.is_empty() || config.namespace.len() > MAX_NAMESPACE_LEN {
            return Err(KvError::InvalidConfig(format!(
                "namespace must be 1-{} bytes",
                MAX_NAMESPACE_LEN
            )));
        }
        if !(PARTITION_BITS..=MAX_BUCKETS_LOG2).contains(&config.initial_buckets_log2) {
            return Err(KvError::InvalidConfig(format!(
                "initial bucket bits must be {}-{}",
                PARTITION_BITS, MAX_BUCKETS_LOG2
            )));
        }
        if config.max_load_percent == 0 {
            return Err(KvError::InvalidConfig(
                "max load percent must be positive".to_string(),
            ));
        }

        let options = DatabaseOptions {
            arena_capacity: config.arena_capacity,
            index: IndexParams {
                hash_function: config.hash_function,
                initial_buckets_log2: config.initial_buckets_log2,
                max_load_percent: config.max_load_percent,
            },
        };

        let db = Database::get_or_create(
            &config.namespace,
            &options,
            config.clock.as_ref(),
            config.keep_attached,
        )?;

        // Set and hash indexes follow the namespace's settings, which may
        // differ from this store's config if another store created it.
        let nested_params = {
            let attachment = db.attach()?;
            let index = attachment.index();
            IndexParams {
                hash_function: index.hash_function(),
                initial_buckets_log2: PARTITION_BITS,
                max_load_percent: index.max_load_percent(),
            }
        };

        Ok(Self {
            db,
            clock: config.clock,
            nested_params,
            ttl_config: config.ttl_sweeper,
            ttl_sweeper: RwLock::new(None),
        })
    }
}
