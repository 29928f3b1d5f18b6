use std::ops::{Deref, DerefMut};

use parking_lot::lock_api::RawRwLock as RawRwLockApi;
use parking_lot::RawRwLock;

use super::{Index, IndexEntry};
use crate::error::Result;
use crate::storage::{Arena, ArenaPtr};

/// Held partition lock, released on drop.
pub(super) struct PartitionLock<'a> {
    lock: &'a RawRwLock,
    exclusive: bool,
}

impl<'a> PartitionLock<'a> {
    pub(super) fn shared(lock: &'a RawRwLock) -> Self {
        lock.lock_shared();
        Self {
            lock,
            exclusive: false,
        }
    }

    pub(super) fn exclusive(lock: &'a RawRwLock) -> Self {
        lock.lock_exclusive();
        Self {
            lock,
            exclusive: true,
        }
    }

    pub(super) fn is_exclusive(&self) -> bool {
        self.exclusive
    }
}

impl Drop for PartitionLock<'_> {
    fn drop(&mut self) {
        // SAFETY: the lock was acquired in the matching mode by the
        // constructor and is released exactly once here.
        unsafe {
            if self.exclusive {
                self.lock.unlock_exclusive();
            } else {
                self.lock.unlock_shared();
            }
        }
    }
}

/// Share-locked entry. Other readers of the same partition may proceed;
/// writers wait until the guard is dropped.
pub struct EntryRef<'a, E: IndexEntry> {
    index: &'a Index<E>,
    node: ArenaPtr,
    _lock: PartitionLock<'a>,
}

impl<'a, E: IndexEntry> EntryRef<'a, E> {
    pub(super) fn new(index: &'a Index<E>, node: ArenaPtr, lock: PartitionLock<'a>) -> Self {
        Self {
            index,
            node,
            _lock: lock,
        }
    }

    pub fn arena(&self) -> &'a Arena {
        self.index.arena()
    }
}

impl<E: IndexEntry> Deref for EntryRef<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        // SAFETY: the node cannot be unlinked or freed while its partition
        // is share-locked.
        unsafe { &(*self.index.node(self.node)).entry }
    }
}

/// Exclusively locked entry.
pub struct EntryMut<'a, E: IndexEntry> {
    index: &'a Index<E>,
    node: ArenaPtr,
    hash: u32,
    lock: PartitionLock<'a>,
}

impl<'a, E: IndexEntry> EntryMut<'a, E> {
    pub(super) fn new(
        index: &'a Index<E>,
        node: ArenaPtr,
        hash: u32,
        lock: PartitionLock<'a>,
    ) -> Self {
        debug_assert!(lock.is_exclusive());
        Self {
            index,
            node,
            hash,
            lock,
        }
    }

    pub fn arena(&self) -> &'a Arena {
        self.index.arena()
    }

    /// Unlink the entry and free its node and key, then release the lock.
    ///
    /// Any payload must already have been released.
    pub fn remove(self) -> Result<()> {
        let result = self.index.unlink(self.node, self.hash);
        drop(self.lock);
        result
    }
}

impl<E: IndexEntry> Deref for EntryMut<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        // SAFETY: exclusive partition lock held.
        unsafe { &(*self.index.node(self.node)).entry }
    }
}

impl<E: IndexEntry> DerefMut for EntryMut<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        // SAFETY: exclusive partition lock held.
        unsafe { &mut (*self.index.node(self.node)).entry }
    }
}
