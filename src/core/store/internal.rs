use std::time::{Duration, Instant};

use crate::constants::*;
use crate::core::entry::{Entry, Value};
use crate::core::index::EntryMut;
use crate::error::{KvError, Result};
use crate::stats::Statistics;

use super::KvStore;

impl KvStore {
    pub(super) fn validate_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() || key.len() > MAX_KEY_SIZE {
            return Err(KvError::InvalidKeySize);
        }
        Ok(())
    }

    /// Values and members may be empty.
    pub(super) fn validate_value(&self, value: &[u8]) -> Result<()> {
        if value.len() > MAX_VALUE_SIZE {
            return Err(KvError::InvalidValueSize);
        }
        Ok(())
    }

    /// Current clock reading in nanoseconds.
    pub(crate) fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Statistics hub of the namespace (for the TTL sweeper)
    pub(crate) fn stats_hub(&self) -> &Statistics {
        self.db.stats()
    }

    /// Clock reading `ttl` from now. Saturates rather than wrapping, so an
    /// oversized TTL means the key effectively never expires.
    pub(super) fn expiry_after(&self, ttl: Duration) -> u64 {
        let nanos = u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX);
        self.now().saturating_add(nanos).max(1)
    }

    pub(super) fn elapsed_ns(start: Instant) -> u64 {
        start.elapsed().as_nanos() as u64
    }

    /// Count failures before handing them back.
    pub(super) fn track<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            self.db.stats().record_error(e);
        }
        result
    }
}

/// Undo a write that failed after `find_or_insert`.
///
/// Releases whatever was partially built in the entry and restores
/// `previous`; an entry the write itself inserted is removed again so the
/// key reads as absent.
pub(super) fn rollback(mut entry: EntryMut<'_, Entry>, found: bool, previous: Value) -> Result<()> {
    let arena = entry.arena();
    entry.replace_value(arena, previous)?;
    if !found {
        entry.remove()?;
    }
    Ok(())
}
