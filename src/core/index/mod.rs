//! Concurrent hash index living in an arena.
//!
//! The table is an array of `2^size_log2` bucket heads, each the start of a
//! singly linked chain of nodes. Locking is per partition: the top
//! [`PARTITION_BITS`] bits of a key's hash pick one of [`NUM_PARTITIONS`]
//! reader/writer locks, and the top `size_log2` bits pick the bucket. Because
//! both are prefixes of the same hash, every bucket belongs to exactly one
//! partition at any table size, and a partition covers a contiguous run of
//! buckets.
//!
//! The table only grows. Growth takes every partition lock in ascending
//! order, so it is never visible to an operation holding any partition lock,
//! and a thread only starts growth after dropping its own lock.
//!
//! Locked entries are handed out as guards ([`EntryRef`], [`EntryMut`]);
//! dropping the guard is the only way to release the lock.

mod guard;
mod scan;

use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use log::{debug, warn};
use parking_lot::lock_api::RawRwLock as RawRwLockApi;
use parking_lot::RawRwLock;

use crate::constants::*;
use crate::error::{KvError, Result};
use crate::storage::{Arena, ArenaPtr, SharedString};
use crate::utils::hash::HashFunction;

pub use guard::{EntryMut, EntryRef};
pub use scan::SeqScan;

use guard::PartitionLock;

/// A record type that can be stored in an [`Index`].
///
/// The key is owned by the entry itself: [`create`](IndexEntry::create)
/// copies it into the arena and [`release_key`](IndexEntry::release_key)
/// frees it. Any payload beyond the key is the caller's to release before
/// the entry is removed.
pub trait IndexEntry: Copy + Send + Sync + 'static {
    /// Distinguishes entry layouts so an index is never attached as the
    /// wrong type.
    const TAG: u32;

    /// The arena copy of the key this entry is indexed under.
    fn key(&self) -> SharedString;

    fn key_matches(&self, arena: &Arena, key: &[u8]) -> bool;

    /// Build a fresh entry holding a copy of `key` and an empty payload.
    fn create(arena: &Arena, key: &[u8]) -> Result<Self>;

    fn release_key(&self, arena: &Arena) -> Result<()>;
}

/// Process-independent reference to an index, storable in the arena.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexHandle(ArenaPtr);

impl IndexHandle {
    pub const INVALID: IndexHandle = IndexHandle(ArenaPtr::INVALID);

    pub fn is_valid(self) -> bool {
        self.0.is_valid()
    }
}

/// Creation parameters. They are recorded in the index header, so attachers
/// never need to supply them.
#[derive(Debug, Clone, Copy)]
pub struct IndexParams {
    pub hash_function: HashFunction,
    pub initial_buckets_log2: u32,
    pub max_load_percent: u32,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            hash_function: HashFunction::Default,
            initial_buckets_log2: DEFAULT_BUCKETS_LOG2,
            max_load_percent: DEFAULT_MAX_LOAD_PERCENT,
        }
    }
}

#[repr(C)]
struct Partition {
    lock: RawRwLock,
    count: AtomicU64,
}

#[repr(C)]
struct IndexHeader {
    magic: u32,
    tag: u32,
    entry_size: u32,
    hash_function: u32,
    max_load_percent: u32,
    // Both change only while every partition is locked exclusively.
    size_log2: AtomicU32,
    buckets: AtomicU64,
    partitions: [Partition; NUM_PARTITIONS],
}

#[repr(C)]
pub(crate) struct Node<E> {
    next: ArenaPtr,
    hash: u32,
    entry: E,
}

#[inline]
fn partition_of(hash: u32) -> usize {
    (hash >> (32 - PARTITION_BITS)) as usize
}

#[inline]
fn bucket_of(hash: u32, size_log2: u32) -> usize {
    (hash >> (32 - size_log2)) as usize
}

/// First bucket of `partition` at table size `size_log2`.
#[inline]
fn partition_first_bucket(partition: usize, size_log2: u32) -> usize {
    partition << (size_log2 - PARTITION_BITS)
}

/// A process-local attachment to an index.
///
/// Dropping it is the detach: only local state goes away.
pub struct Index<E: IndexEntry> {
    arena: Arena,
    header: ArenaPtr,
    hash_function: HashFunction,
    _marker: PhantomData<E>,
}

impl<E: IndexEntry> std::fmt::Debug for Index<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("header", &self.header.offset())
            .field("hash_function", &self.hash_function)
            .finish()
    }
}

impl<E: IndexEntry> Index<E> {
    /// Create an empty index in `arena`.
    ///
    /// # Errors
    ///
    /// * `InvalidConfig` - bucket count or load factor out of range
    /// * `OutOfMemory` - the arena cannot hold the header and bucket array
    pub fn create(arena: &Arena, params: IndexParams) -> Result<Self> {
        if params.initial_buckets_log2 < PARTITION_BITS
            || params.initial_buckets_log2 > MAX_BUCKETS_LOG2
        {
            return Err(KvError::InvalidConfig(format!(
                "initial bucket bits must be {}-{}",
                PARTITION_BITS, MAX_BUCKETS_LOG2
            )));
        }
        if params.max_load_percent == 0 {
            return Err(KvError::InvalidConfig(
                "max load percent must be positive".to_string(),
            ));
        }

        let bucket_bytes = (1usize << params.initial_buckets_log2) * mem::size_of::<ArenaPtr>();
        let buckets = arena.allocate_zeroed(bucket_bytes)?;
        let header = match arena.allocate(mem::size_of::<IndexHeader>()) {
            Ok(ptr) => ptr,
            Err(e) => {
                arena.free(buckets)?;
                return Err(e);
            }
        };

        // SAFETY: `header` is a fresh block large enough for an IndexHeader
        // and unreachable by anyone else until the handle is published.
        unsafe {
            arena.resolve::<IndexHeader>(header).write(IndexHeader {
                magic: INDEX_MAGIC,
                tag: E::TAG,
                entry_size: mem::size_of::<E>() as u32,
                hash_function: params.hash_function as u32,
                max_load_percent: params.max_load_percent,
                size_log2: AtomicU32::new(params.initial_buckets_log2),
                buckets: AtomicU64::new(buckets.offset()),
                partitions: std::array::from_fn(|_| Partition {
                    lock: RawRwLock::INIT,
                    count: AtomicU64::new(0),
                }),
            });
        }

        debug!(
            "index created at {:#x} with {} buckets",
            header.offset(),
            1usize << params.initial_buckets_log2
        );

        Ok(Self {
            arena: arena.clone(),
            header,
            hash_function: params.hash_function,
            _marker: PhantomData,
        })
    }

    /// Attach to an index created earlier in `arena`.
    ///
    /// # Errors
    ///
    /// * `InvalidHandle` - the handle is the invalid handle
    /// * `IndexMismatch` - the index stores a different entry type
    /// * `Corrupted` - the header does not look like an index header
    pub fn attach(arena: &Arena, handle: IndexHandle) -> Result<Self> {
        if !handle.is_valid() {
            return Err(KvError::InvalidHandle(0));
        }
        // SAFETY: the immutable header fields are written once before the
        // handle is ever published.
        let header = unsafe { &*arena.resolve::<IndexHeader>(handle.0) };
        if header.magic != INDEX_MAGIC {
            return Err(KvError::Corrupted("index header magic"));
        }
        if header.tag != E::TAG || header.entry_size as usize != mem::size_of::<E>() {
            return Err(KvError::IndexMismatch);
        }
        let hash_function = HashFunction::from_raw(header.hash_function)
            .ok_or(KvError::Corrupted("index hash function"))?;

        Ok(Self {
            arena: arena.clone(),
            header: handle.0,
            hash_function,
            _marker: PhantomData,
        })
    }

    pub fn handle(&self) -> IndexHandle {
        IndexHandle(self.header)
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    pub fn max_load_percent(&self) -> u32 {
        self.header().max_load_percent
    }

    #[inline]
    fn header(&self) -> &IndexHeader {
        // SAFETY: the header outlives every attachment; shared fields are
        // atomics or raw locks.
        unsafe { &*self.arena.resolve::<IndexHeader>(self.header) }
    }

    #[inline]
    fn partition(&self, partition: usize) -> &Partition {
        &self.header().partitions[partition]
    }

    #[inline]
    pub(crate) fn node(&self, node: ArenaPtr) -> *mut Node<E> {
        self.arena.resolve::<Node<E>>(node)
    }

    /// Pointer to the head slot of `bucket`. Caller holds a partition lock.
    #[inline]
    fn bucket_slot(&self, bucket: usize) -> *mut ArenaPtr {
        let buckets = ArenaPtr::from_offset(self.header().buckets.load(Ordering::Acquire));
        // SAFETY: `bucket` is below the current bucket count, which cannot
        // change while the caller holds a partition lock.
        unsafe { self.arena.resolve::<ArenaPtr>(buckets).add(bucket) }
    }

    #[inline]
    fn size_log2(&self) -> u32 {
        self.header().size_log2.load(Ordering::Acquire)
    }

    /// Walk the chain `hash` maps to. Caller holds the partition lock.
    fn search(&self, hash: u32, key: &[u8]) -> Option<ArenaPtr> {
        let bucket = bucket_of(hash, self.size_log2());
        // SAFETY: the chain cannot change under the caller's partition lock.
        unsafe {
            let mut cursor = *self.bucket_slot(bucket);
            while cursor.is_valid() {
                let node = &*self.node(cursor);
                if node.hash == hash && node.entry.key_matches(&self.arena, key) {
                    return Some(cursor);
                }
                cursor = node.next;
            }
        }
        None
    }

    /// Find `key` for reading. The entry stays share-locked while the guard
    /// lives.
    pub fn find(&self, key: &[u8]) -> Option<EntryRef<'_, E>> {
        let hash = self.hash_function.hash(key);
        let lock = PartitionLock::shared(&self.partition(partition_of(hash)).lock);
        let node = self.search(hash, key)?;
        Some(EntryRef::new(self, node, lock))
    }

    /// Find `key` for mutation. The entry stays exclusively locked while the
    /// guard lives.
    pub fn find_mut(&self, key: &[u8]) -> Option<EntryMut<'_, E>> {
        let hash = self.hash_function.hash(key);
        let partition = partition_of(hash);
        let lock = PartitionLock::exclusive(&self.partition(partition).lock);
        let node = self.search(hash, key)?;
        Some(EntryMut::new(self, node, hash, lock))
    }

    /// Find `key` for mutation, inserting a fresh entry if it is missing.
    ///
    /// Returns the locked entry and whether it already existed.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if a new node cannot be allocated; the index is
    /// left unchanged and no lock is held.
    pub fn find_or_insert(&self, key: &[u8]) -> Result<(EntryMut<'_, E>, bool)> {
        let hash = self.hash_function.hash(key);
        let partition = partition_of(hash);
        let mut may_grow = true;

        loop {
            let lock = PartitionLock::exclusive(&self.partition(partition).lock);
            if let Some(node) = self.search(hash, key) {
                return Ok((EntryMut::new(self, node, hash, lock), true));
            }

            let size_log2 = self.size_log2();
            if may_grow && self.partition_overloaded(partition, size_log2) {
                drop(lock);
                self.grow(size_log2);
                may_grow = false;
                continue;
            }

            let entry = E::create(&self.arena, key)?;
            let node = match self.arena.allocate(mem::size_of::<Node<E>>()) {
                Ok(node) => node,
                Err(e) => {
                    entry.release_key(&self.arena)?;
                    return Err(e);
                }
            };

            // SAFETY: fresh node; the bucket is protected by our exclusive
            // partition lock.
            unsafe {
                let slot = self.bucket_slot(bucket_of(hash, size_log2));
                self.node(node).write(Node {
                    next: *slot,
                    hash,
                    entry,
                });
                *slot = node;
            }
            self.partition(partition).count.fetch_add(1, Ordering::AcqRel);

            return Ok((EntryMut::new(self, node, hash, lock), false));
        }
    }

    /// Remove `key` if present, freeing its node and key.
    ///
    /// Only for entries with no payload beyond the key; use
    /// [`find_mut`](Self::find_mut) and [`EntryMut::remove`] otherwise.
    pub fn delete_key(&self, key: &[u8]) -> Result<bool> {
        match self.find_mut(key) {
            Some(entry) => {
                entry.remove()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Unlink `node` from its chain and free it. Caller holds the partition
    /// lock exclusively.
    pub(crate) fn unlink(&self, node: ArenaPtr, hash: u32) -> Result<()> {
        let bucket = bucket_of(hash, self.size_log2());
        // SAFETY: exclusive partition lock held by the caller.
        unsafe {
            let mut slot = self.bucket_slot(bucket);
            while (*slot).is_valid() && *slot != node {
                slot = &mut (*self.node(*slot)).next;
            }
            if !(*slot).is_valid() {
                return Err(KvError::Corrupted("index node missing from its chain"));
            }
            let removed = &*self.node(node);
            *slot = removed.next;
            removed.entry.release_key(&self.arena)?;
        }
        self.arena.free(node)?;
        self.partition(partition_of(hash))
            .count
            .fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    fn partition_overloaded(&self, partition: usize, size_log2: u32) -> bool {
        if size_log2 >= MAX_BUCKETS_LOG2 {
            return false;
        }
        let buckets_per_partition = 1u64 << (size_log2 - PARTITION_BITS);
        let count = self.partition(partition).count.load(Ordering::Acquire);
        count * 100 > buckets_per_partition * self.header().max_load_percent as u64
    }

    /// Double the bucket array, unless someone else already grew it past
    /// `seen_log2`. Must be called with no partition lock held.
    fn grow(&self, seen_log2: u32) {
        let header = self.header();
        let _locks: Vec<PartitionLock<'_>> = header
            .partitions
            .iter()
            .map(|p| PartitionLock::exclusive(&p.lock))
            .collect();

        let old_log2 = header.size_log2.load(Ordering::Acquire);
        if old_log2 != seen_log2 || old_log2 >= MAX_BUCKETS_LOG2 {
            return;
        }

        let new_log2 = old_log2 + 1;
        let new_len = 1usize << new_log2;
        let new_buckets = match self
            .arena
            .allocate_zeroed(new_len * mem::size_of::<ArenaPtr>())
        {
            Ok(ptr) => ptr,
            Err(e) => {
                warn!(
                    "index {:#x} cannot grow to {} buckets: {}",
                    self.header.offset(),
                    new_len,
                    e
                );
                return;
            }
        };

        let old_buckets = ArenaPtr::from_offset(header.buckets.load(Ordering::Acquire));
        // SAFETY: every partition is locked exclusively; no one else can
        // observe the chains while they are relinked.
        unsafe {
            let old = self.arena.resolve::<ArenaPtr>(old_buckets);
            let new = self.arena.resolve::<ArenaPtr>(new_buckets);
            for bucket in 0..(1usize << old_log2) {
                let mut cursor = *old.add(bucket);
                while cursor.is_valid() {
                    let node = &mut *self.node(cursor);
                    debug_assert_eq!(
                        node.hash,
                        node.entry.key().hash(&self.arena, self.hash_function),
                        "cached hash does not match the stored key"
                    );
                    let next = node.next;
                    let slot = new.add(bucket_of(node.hash, new_log2));
                    node.next = *slot;
                    *slot = cursor;
                    cursor = next;
                }
            }
        }

        header.buckets.store(new_buckets.offset(), Ordering::Release);
        header.size_log2.store(new_log2, Ordering::Release);

        if let Err(e) = self.arena.free(old_buckets) {
            warn!("index {:#x} leaked its old buckets: {}", self.header.offset(), e);
        }
        debug!("index {:#x} grew to {} buckets", self.header.offset(), new_len);
    }

    /// Number of entries. Exact when no writer is active.
    pub fn len(&self) -> usize {
        self.header()
            .partitions
            .iter()
            .map(|p| p.count.load(Ordering::Acquire))
            .sum::<u64>() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_count(&self) -> usize {
        let _lock = PartitionLock::shared(&self.partition(0).lock);
        1usize << self.size_log2()
    }

    /// Iterate over every entry, one partition at a time.
    ///
    /// With `exclusive` the scan may mutate and delete the entries it visits.
    pub fn scan(&self, exclusive: bool) -> SeqScan<'_, E> {
        SeqScan::new(self, exclusive, 0, NUM_PARTITIONS)
    }

    /// Iterate over partitions `start..start + count`, wrapping around.
    pub fn scan_partitions(&self, exclusive: bool, start: usize, count: usize) -> SeqScan<'_, E> {
        SeqScan::new(self, exclusive, start % NUM_PARTITIONS, count.min(NUM_PARTITIONS))
    }

    /// Tear the whole index down, handing every entry to `release` before
    /// its node and key are freed.
    ///
    /// The caller must guarantee nobody else is using the index, which is
    /// why this consumes the attachment.
    pub fn destroy_with<F>(self, mut release: F) -> Result<()>
    where
        F: FnMut(&E) -> Result<()>,
    {
        let header = self.header();
        let size_log2 = header.size_log2.load(Ordering::Acquire);
        let buckets = ArenaPtr::from_offset(header.buckets.load(Ordering::Acquire));
        let mut freed = 0usize;

        for bucket in 0..(1usize << size_log2) {
            // SAFETY: exclusive use is guaranteed by the caller.
            let mut cursor = unsafe { *self.arena.resolve::<ArenaPtr>(buckets).add(bucket) };
            while cursor.is_valid() {
                // SAFETY: as above.
                let node = unsafe { &*self.node(cursor) };
                let next = node.next;
                release(&node.entry)?;
                node.entry.release_key(&self.arena)?;
                self.arena.free(cursor)?;
                freed += 1;
                cursor = next;
            }
        }

        self.arena.free(buckets)?;
        self.arena.free(self.header)?;
        debug!(
            "index {:#x} destroyed, {} entries released",
            self.header.offset(),
            freed
        );
        Ok(())
    }
}
