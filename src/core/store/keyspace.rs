use bytes::Bytes;
use log::{debug, trace};
use std::time::Instant;

use crate::core::entry::ValueKind;
use crate::error::Result;

use super::KvStore;

impl KvStore {
    /// Report which kind of value `key` holds.
    ///
    /// Returns `ValueKind::Null` for an absent key.
    pub fn key_type(&self, key: &[u8]) -> Result<ValueKind> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let kind = match attachment.find(key) {
            Some(entry) if entry.value.is_live() => entry.value.kind(),
            _ => ValueKind::Null,
        };
        Ok(kind)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.key_type(key)? != ValueKind::Null)
    }

    /// Delete `key` and everything its value owns.
    ///
    /// # Returns
    ///
    /// Whether the key was present.
    pub fn del(&self, key: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let result = self.del_internal(key);
        self.track(result)
    }

    fn del_internal(&self, key: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;

        let Some(mut entry) = attachment.find_mut(key) else {
            return Ok(false);
        };
        let was_live = entry.value.is_live();
        let arena = entry.arena();
        // Value first, then the entry and its key.
        entry.take_value(arena)?;
        entry.remove()?;

        trace!("deleted a {} byte key", key.len());
        self.db.stats().record_delete(Self::elapsed_ns(start));
        Ok(was_live)
    }

    /// Copy out every key in the namespace, in no particular order.
    pub fn keys(&self) -> Result<Vec<Bytes>> {
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let mut keys = Vec::with_capacity(attachment.index().len());

        let mut scan = attachment.index().scan(false);
        while let Some(entry) = scan.next() {
            if entry.value.is_live() {
                keys.push(entry.key.to_bytes(arena));
            }
        }
        drop(scan);

        self.db.stats().record_scan();
        Ok(keys)
    }

    /// Delete every key in the namespace.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub fn flush_all(&self) -> Result<usize> {
        let result = self.flush_internal();
        self.track(result)
    }

    fn flush_internal(&self) -> Result<usize> {
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let mut removed = 0;

        let mut scan = attachment.index().scan(true);
        while let Some(entry) = scan.next_mut() {
            if entry.value.is_live() {
                removed += 1;
            }
            entry.take_value(arena)?;
            scan.delete_current()?;
        }
        drop(scan);

        debug!(
            "flushed {} keys from namespace '{}'",
            removed,
            self.db.namespace()
        );
        self.db.stats().record_scan();
        Ok(removed)
    }
}
