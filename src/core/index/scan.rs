use super::guard::PartitionLock;
use super::{partition_first_bucket, Index, IndexEntry};
use crate::constants::{NUM_PARTITIONS, PARTITION_BITS};
use crate::error::{KvError, Result};
use crate::storage::ArenaPtr;

/// Sequential scan over an index.
///
/// Partitions are visited one at a time and the current one stays locked
/// until the scan moves past it, so growth can only happen between
/// partitions. Every entry present for the whole scan is visited exactly
/// once; entries inserted meanwhile may or may not be seen.
pub struct SeqScan<'a, E: IndexEntry> {
    index: &'a Index<E>,
    exclusive: bool,
    next_partition: usize,
    partitions_left: usize,
    lock: Option<PartitionLock<'a>>,
    bucket: usize,
    bucket_end: usize,
    current: ArenaPtr,
    current_hash: u32,
    next: ArenaPtr,
}

impl<'a, E: IndexEntry> SeqScan<'a, E> {
    pub(super) fn new(index: &'a Index<E>, exclusive: bool, start: usize, count: usize) -> Self {
        Self {
            index,
            exclusive,
            next_partition: start,
            partitions_left: count,
            lock: None,
            bucket: 0,
            bucket_end: 0,
            current: ArenaPtr::INVALID,
            current_hash: 0,
            next: ArenaPtr::INVALID,
        }
    }

    fn advance(&mut self) -> Option<ArenaPtr> {
        loop {
            if self.next.is_valid() {
                let node = self.next;
                // SAFETY: the node's partition is locked by this scan.
                let (next, hash) = unsafe {
                    let n = &*self.index.node(node);
                    (n.next, n.hash)
                };
                self.current = node;
                self.current_hash = hash;
                self.next = next;
                return Some(node);
            }

            if self.lock.is_some() && self.bucket + 1 < self.bucket_end {
                self.bucket += 1;
                // SAFETY: bucket is inside the locked partition's range.
                self.next = unsafe { *self.index.bucket_slot(self.bucket) };
                continue;
            }

            self.lock = None;
            if self.partitions_left == 0 {
                self.current = ArenaPtr::INVALID;
                return None;
            }

            let partition = self.next_partition;
            self.next_partition = (partition + 1) % NUM_PARTITIONS;
            self.partitions_left -= 1;

            let lock = &self.index.partition(partition).lock;
            self.lock = Some(if self.exclusive {
                PartitionLock::exclusive(lock)
            } else {
                PartitionLock::shared(lock)
            });

            // Table size is re-read under each partition lock, so growth
            // between partitions is picked up.
            let size_log2 = self.index.size_log2();
            self.bucket = partition_first_bucket(partition, size_log2);
            self.bucket_end = self.bucket + (1usize << (size_log2 - PARTITION_BITS));
            // SAFETY: first bucket of the partition now locked.
            self.next = unsafe { *self.index.bucket_slot(self.bucket) };
        }
    }

    /// Next entry, or `None` once the scan is exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<&E> {
        let node = self.advance()?;
        // SAFETY: the node stays valid while its partition is locked, which
        // lasts at least until the next call borrowing `self` mutably.
        Some(unsafe { &(*self.index.node(node)).entry })
    }

    /// Next entry for mutation. Only on exclusive scans.
    pub fn next_mut(&mut self) -> Option<&mut E> {
        if !self.exclusive {
            return None;
        }
        let node = self.advance()?;
        // SAFETY: exclusive partition lock held, see `next`.
        Some(unsafe { &mut (*self.index.node(node)).entry })
    }

    /// Remove the entry most recently returned. Its payload must already be
    /// released.
    pub fn delete_current(&mut self) -> Result<()> {
        if !self.exclusive || !self.current.is_valid() {
            return Err(KvError::Corrupted("no current entry in exclusive scan"));
        }
        self.index.unlink(self.current, self.current_hash)?;
        self.current = ArenaPtr::INVALID;
        Ok(())
    }
}
