use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::constants::{NO_EXPIRY, NUM_PARTITIONS};
use crate::core::ttl_sweep::{SweeperSnapshot, TtlSweeper};
use crate::error::Result;

use super::KvStore;

impl KvStore {
    /// Get the expiry timestamp of `key`, in clock nanoseconds.
    ///
    /// # Returns
    ///
    /// `None` if the key is absent or never expires.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use arenakv::KvStore;
    /// # use std::time::Duration;
    /// # fn main() -> arenakv::Result<()> {
    /// # let store = KvStore::new("doc-expiry")?;
    /// store.set_ex(b"session", b"data", Duration::from_secs(60))?;
    /// assert!(store.get_expiry(b"session")?.is_some());
    ///
    /// store.set(b"forever", b"data")?;
    /// assert!(store.get_expiry(b"forever")?.is_none());
    /// # Ok(())
    /// # }
    /// ```
    pub fn get_expiry(&self, key: &[u8]) -> Result<Option<u64>> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        Ok(attachment
            .find(key)
            .filter(|entry| entry.value.is_live())
            .and_then(|entry| entry.expiry()))
    }

    /// Get the remaining time to live of `key`.
    ///
    /// Returns `Some(Duration::ZERO)` for a key past its expiry that has not
    /// been swept yet, and `None` if the key is absent or never expires.
    pub fn ttl(&self, key: &[u8]) -> Result<Option<Duration>> {
        let Some(expire_at) = self.get_expiry(key)? else {
            return Ok(None);
        };
        Ok(Some(Duration::from_nanos(
            expire_at.saturating_sub(self.now()),
        )))
    }

    /// Set `key` to expire after `ttl`.
    ///
    /// # Returns
    ///
    /// Whether the key exists.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> Result<bool> {
        self.validate_key(key)?;
        let expire_at = self.expiry_after(ttl);
        self.update_expiry(key, expire_at)
    }

    /// Remove any expiry from `key`.
    ///
    /// # Returns
    ///
    /// Whether an expiry was removed.
    pub fn persist(&self, key: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(mut entry) = attachment.find_mut(key) else {
            return Ok(false);
        };
        if !entry.value.is_live() || entry.expire_at == NO_EXPIRY {
            return Ok(false);
        }
        entry.expire_at = NO_EXPIRY;
        Ok(true)
    }

    fn update_expiry(&self, key: &[u8], expire_at: u64) -> Result<bool> {
        let attachment = self.db.attach()?;
        let updated = match attachment.find_mut(key) {
            Some(mut entry) if entry.value.is_live() => {
                entry.expire_at = expire_at;
                true
            }
            _ => false,
        };
        Ok(updated)
    }

    /// Delete every key whose expiry has passed.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub fn purge_expired(&self) -> Result<u64> {
        let (_, expired) = self.sweep_expired_batch(usize::MAX, usize::MAX, 0)?;
        Ok(expired)
    }

    /// Examine up to `sample_size` keys that carry an expiry, starting at
    /// `first_partition`, and delete the expired ones. At most `max_visited`
    /// entries are walked in total, with or without an expiry.
    ///
    /// Returns how many were examined and how many deleted.
    pub(crate) fn sweep_expired_batch(
        &self,
        sample_size: usize,
        max_visited: usize,
        first_partition: usize,
    ) -> Result<(u64, u64)> {
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let now = self.now();
        let mut sampled = 0u64;
        let mut expired = 0u64;
        let mut visited = 0usize;

        let mut scan = attachment
            .index()
            .scan_partitions(true, first_partition, NUM_PARTITIONS);
        while (sampled as usize) < sample_size && visited < max_visited {
            let Some(entry) = scan.next_mut() else {
                break;
            };
            visited += 1;
            if entry.expire_at == NO_EXPIRY {
                continue;
            }
            sampled += 1;
            if entry.is_expired(now) {
                entry.take_value(arena)?;
                scan.delete_current()?;
                expired += 1;
            }
        }
        drop(scan);

        if expired > 0 {
            self.db.stats().record_expired(expired);
            debug!("swept {} expired keys", expired);
        }
        Ok((sampled, expired))
    }

    /// Start the expiry sweeper if one is configured.
    ///
    /// This must be called with an `Arc<Self>` after construction; the
    /// sweeper holds only a weak reference and stops with the store.
    pub fn start_ttl_sweeper(self: &Arc<Self>) {
        let Some(config) = self.ttl_config.clone() else {
            return;
        };
        if !config.enabled {
            return;
        }

        let mut slot = self.ttl_sweeper.write();
        if slot.is_some() {
            return;
        }
        let mut sweeper = TtlSweeper::new(Arc::downgrade(self), config);
        sweeper.start();
        *slot = Some(sweeper);
    }

    /// Statistics of the running sweeper, if any.
    pub fn ttl_sweeper_stats(&self) -> Option<SweeperSnapshot> {
        self.ttl_sweeper.read().as_ref().map(|s| s.stats())
    }
}
