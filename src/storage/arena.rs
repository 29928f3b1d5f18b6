//! Shared arena the whole database lives in.
//!
//! An arena is one contiguous anonymous mapping. Every link between shared
//! structures is an [`ArenaPtr`], an offset from the start of the mapping, and
//! is turned into an address only by the [`Arena`] a caller attached. Nothing
//! stored inside the mapping is ever a process address.
//!
//! The mapping starts with an [`ArenaHeader`] holding the allocator state and
//! the allocator lock. Blocks are carved from a bump pointer and recycled
//! through power-of-two size-class free lists.

use std::collections::HashMap;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::RandomState;
use log::debug;
use memmap2::MmapMut;
use once_cell::sync::Lazy;
use parking_lot::lock_api::RawMutex as RawMutexApi;
use parking_lot::{Mutex, RawMutex};

use crate::constants::*;
use crate::error::{KvError, Result};

/// Offset of a block inside an arena. Offset zero is the arena header, so it
/// doubles as the invalid pointer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArenaPtr(u64);

impl ArenaPtr {
    pub const INVALID: ArenaPtr = ArenaPtr(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    #[inline]
    pub fn offset(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn from_offset(offset: u64) -> Self {
        ArenaPtr(offset)
    }
}

/// Process-independent name of an arena, storable in shared memory.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaHandle(u64);

impl ArenaHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[repr(C, align(64))]
struct ArenaHeader {
    magic: u64,
    capacity: u64,
    lock: RawMutex,
    // Guarded by `lock`.
    bump: u64,
    free_lists: [u64; SIZE_CLASSES],
    used_bytes: AtomicU64,
    reserved_bytes: AtomicU64,
    live_blocks: AtomicU64,
}

#[repr(C)]
struct BlockHeader {
    state: u32,
    class: u32,
    requested: u64,
}

const DATA_START: u64 =
    ((mem::size_of::<ArenaHeader>() + ARENA_HEADER_ALIGN - 1) & !(ARENA_HEADER_ALIGN - 1)) as u64;

/// Allocator counters, all in bytes except `live_blocks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub capacity: usize,
    /// Bytes requested by live allocations.
    pub used_bytes: usize,
    /// Bytes held by live blocks including headers and rounding.
    pub reserved_bytes: usize,
    /// Highest offset ever handed out.
    pub high_water: usize,
    pub live_blocks: u64,
}

pub(crate) struct ArenaRegion {
    handle: ArenaHandle,
    base: NonNull<u8>,
    len: usize,
    _map: MmapMut,
}

// The mapping is only touched through offsets resolved against `base`; all
// mutation of shared state is serialized by locks stored in the mapping.
unsafe impl Send for ArenaRegion {}
unsafe impl Sync for ArenaRegion {}

impl Drop for ArenaRegion {
    fn drop(&mut self) {
        let mut arenas = ARENAS.lock();
        if let Some(slot) = arenas.get(&self.handle.0) {
            if slot.region.strong_count() == 0 && slot.pinned.is_none() {
                arenas.remove(&self.handle.0);
            }
        }
        debug!("arena {} unmapped ({} bytes)", self.handle.0, self.len);
    }
}

struct ArenaSlot {
    region: Weak<ArenaRegion>,
    pinned: Option<Arc<ArenaRegion>>,
}

static ARENAS: Lazy<Mutex<HashMap<u64, ArenaSlot, RandomState>>> =
    Lazy::new(|| Mutex::new(HashMap::default()));

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

struct HeaderLock<'a>(&'a RawMutex);

impl<'a> HeaderLock<'a> {
    fn acquire(lock: &'a RawMutex) -> Self {
        lock.lock();
        HeaderLock(lock)
    }
}

impl Drop for HeaderLock<'_> {
    fn drop(&mut self) {
        // SAFETY: constructed only after `lock()` succeeded on this thread.
        unsafe { self.0.unlock() };
    }
}

/// A process-local attachment to an arena.
///
/// Cloning is cheap and shares the same mapping. Dropping the last
/// attachment of an unpinned arena unmaps it.
#[derive(Clone)]
pub struct Arena {
    region: Arc<ArenaRegion>,
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("handle", &self.region.handle.0)
            .field("len", &self.region.len)
            .finish()
    }
}

impl Arena {
    /// Map a fresh arena with room for `capacity` bytes of data.
    pub fn create(capacity: usize) -> Result<Self> {
        if capacity < MIN_ARENA_CAPACITY {
            return Err(KvError::InvalidConfig(format!(
                "arena capacity {} is below the minimum of {} bytes",
                capacity, MIN_ARENA_CAPACITY
            )));
        }

        let capacity = (capacity + ARENA_ALIGNMENT - 1) & !(ARENA_ALIGNMENT - 1);
        let len = DATA_START as usize + capacity;
        let mut map = MmapMut::map_anon(len)?;
        let base = NonNull::new(map.as_mut_ptr()).ok_or(KvError::Corrupted("null mapping"))?;

        // SAFETY: the mapping is at least DATA_START bytes, page aligned and
        // zero filled, and nobody else can see it yet.
        unsafe {
            base.as_ptr().cast::<ArenaHeader>().write(ArenaHeader {
                magic: ARENA_MAGIC,
                capacity: len as u64,
                lock: RawMutex::INIT,
                bump: DATA_START,
                free_lists: [0; SIZE_CLASSES],
                used_bytes: AtomicU64::new(0),
                reserved_bytes: AtomicU64::new(0),
                live_blocks: AtomicU64::new(0),
            });
        }

        let handle = ArenaHandle(NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed));
        let region = Arc::new(ArenaRegion {
            handle,
            base,
            len,
            _map: map,
        });

        ARENAS.lock().insert(
            handle.0,
            ArenaSlot {
                region: Arc::downgrade(&region),
                pinned: None,
            },
        );

        debug!("arena {} created with {} bytes", handle.0, len);
        Ok(Arena { region })
    }

    /// Attach to an existing arena by handle.
    pub fn attach(handle: ArenaHandle) -> Result<Self> {
        let arenas = ARENAS.lock();
        let region = arenas
            .get(&handle.0)
            .and_then(|slot| slot.region.upgrade())
            .ok_or(KvError::InvalidHandle(handle.0))?;
        Ok(Arena { region })
    }

    /// Release this attachment. Shared contents are untouched unless this was
    /// the last attachment of an unpinned arena.
    pub fn detach(self) {
        drop(self);
    }

    pub fn handle(&self) -> ArenaHandle {
        self.region.handle
    }

    /// Keep the arena mapped even when no attachment is alive.
    pub fn pin(&self) {
        let mut arenas = ARENAS.lock();
        if let Some(slot) = arenas.get_mut(&self.region.handle.0) {
            slot.pinned = Some(Arc::clone(&self.region));
        }
        debug!("arena {} pinned", self.region.handle.0);
    }

    pub fn unpin(&self) {
        let released = {
            let mut arenas = ARENAS.lock();
            arenas
                .get_mut(&self.region.handle.0)
                .and_then(|slot| slot.pinned.take())
        };
        // Dropped outside the registry lock; the region's Drop takes it.
        drop(released);
    }

    pub fn capacity(&self) -> usize {
        self.region.len
    }

    fn header(&self) -> &ArenaHeader {
        // SAFETY: the header was written at offset zero in `create`.
        unsafe { &*self.region.base.as_ptr().cast::<ArenaHeader>() }
    }

    fn header_mut_ptr(&self) -> *mut ArenaHeader {
        self.region.base.as_ptr().cast::<ArenaHeader>()
    }

    fn class_for(size: usize) -> Result<u32> {
        let largest = 1u64 << (MIN_BLOCK_SHIFT as usize + SIZE_CLASSES - 1);
        let total = size
            .checked_add(BLOCK_HEADER_SIZE)
            .filter(|&total| total as u64 <= largest)
            .ok_or(KvError::OutOfMemory { requested: size })?;
        let shift = total.next_power_of_two().trailing_zeros().max(MIN_BLOCK_SHIFT);
        let class = shift - MIN_BLOCK_SHIFT;
        if class as usize >= SIZE_CLASSES {
            return Err(KvError::OutOfMemory { requested: size });
        }
        Ok(class)
    }

    #[inline]
    fn class_size(class: u32) -> u64 {
        1u64 << (class + MIN_BLOCK_SHIFT)
    }

    /// Allocate `size` bytes. The returned block is 16-byte aligned.
    pub fn allocate(&self, size: usize) -> Result<ArenaPtr> {
        let class = Self::class_for(size)?;
        let block_size = Self::class_size(class);
        let header = self.header_mut_ptr();

        let block = {
            let _guard = HeaderLock::acquire(&self.header().lock);
            // SAFETY: allocator fields are only touched under the header lock.
            unsafe {
                let head = (*header).free_lists[class as usize];
                if head != 0 {
                    let next = *self.resolve::<u64>(ArenaPtr(head));
                    (*header).free_lists[class as usize] = next;
                    head - BLOCK_HEADER_SIZE as u64
                } else {
                    let bump = (*header).bump;
                    if bump + block_size > (*header).capacity {
                        return Err(KvError::OutOfMemory { requested: size });
                    }
                    (*header).bump = bump + block_size;
                    bump
                }
            }
        };

        // SAFETY: `block` is a block this call now owns exclusively.
        unsafe {
            self.resolve::<BlockHeader>(ArenaPtr(block)).write(BlockHeader {
                state: BLOCK_LIVE,
                class,
                requested: size as u64,
            });
        }

        let header = self.header();
        header.used_bytes.fetch_add(size as u64, Ordering::AcqRel);
        header.reserved_bytes.fetch_add(block_size, Ordering::AcqRel);
        header.live_blocks.fetch_add(1, Ordering::AcqRel);

        Ok(ArenaPtr(block + BLOCK_HEADER_SIZE as u64))
    }

    /// Allocate `size` zero-filled bytes.
    pub fn allocate_zeroed(&self, size: usize) -> Result<ArenaPtr> {
        let ptr = self.allocate(size)?;
        // SAFETY: the block was just allocated with at least `size` bytes.
        unsafe { std::ptr::write_bytes(self.resolve::<u8>(ptr), 0, size) };
        Ok(ptr)
    }

    fn check_block(&self, ptr: ArenaPtr) -> Result<()> {
        let offset = ptr.0;
        let in_range = offset >= DATA_START + BLOCK_HEADER_SIZE as u64
            && offset < self.region.len as u64
            && (offset - DATA_START) % ARENA_ALIGNMENT as u64 == 0;
        if in_range {
            Ok(())
        } else {
            Err(KvError::InvalidArenaPointer(offset))
        }
    }

    /// Return a block to the arena. Freeing a block that is not live is
    /// reported instead of corrupting the free lists.
    pub fn free(&self, ptr: ArenaPtr) -> Result<()> {
        self.check_block(ptr)?;
        let header = self.header_mut_ptr();
        let block_ptr = ArenaPtr(ptr.0 - BLOCK_HEADER_SIZE as u64);

        let (requested, block_size) = {
            let _guard = HeaderLock::acquire(&self.header().lock);
            // SAFETY: block headers and free lists are only modified under the
            // header lock; the offset was range checked above.
            unsafe {
                let block = self.resolve::<BlockHeader>(block_ptr);
                match (*block).state {
                    BLOCK_LIVE => {}
                    BLOCK_FREE => return Err(KvError::DoubleFree(ptr.0)),
                    _ => return Err(KvError::InvalidArenaPointer(ptr.0)),
                }
                let class = (*block).class;
                if class as usize >= SIZE_CLASSES {
                    return Err(KvError::Corrupted("arena block class"));
                }
                (*block).state = BLOCK_FREE;
                *self.resolve::<u64>(ptr) = (*header).free_lists[class as usize];
                (*header).free_lists[class as usize] = ptr.0;
                ((*block).requested, Self::class_size(class))
            }
        };

        let header = self.header();
        header.used_bytes.fetch_sub(requested, Ordering::AcqRel);
        header.reserved_bytes.fetch_sub(block_size, Ordering::AcqRel);
        header.live_blocks.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    /// Translate an arena pointer into an address valid in this process.
    ///
    /// The result is only meaningful while this attachment is alive and the
    /// block has not been freed.
    #[inline]
    pub(crate) fn resolve<T>(&self, ptr: ArenaPtr) -> *mut T {
        debug_assert!(ptr.is_valid(), "resolving the invalid arena pointer");
        debug_assert!(
            ptr.0 as usize + mem::size_of::<T>() <= self.region.len,
            "arena pointer {:#x} out of range",
            ptr.0
        );
        // SAFETY: offsets handed out by this arena lie inside the mapping.
        unsafe { self.region.base.as_ptr().add(ptr.0 as usize).cast::<T>() }
    }

    /// View `len` bytes at `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must hold whatever lock keeps the block alive and unmodified
    /// for the lifetime of the returned slice.
    #[inline]
    pub(crate) unsafe fn bytes(&self, ptr: ArenaPtr, len: usize) -> &[u8] {
        if len == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.resolve::<u8>(ptr), len)
    }

    pub fn stats(&self) -> ArenaStats {
        let header = self.header();
        let high_water = {
            let _guard = HeaderLock::acquire(&header.lock);
            header.bump
        };
        ArenaStats {
            capacity: self.region.len,
            used_bytes: header.used_bytes.load(Ordering::Acquire) as usize,
            reserved_bytes: header.reserved_bytes.load(Ordering::Acquire) as usize,
            high_water: high_water as usize,
            live_blocks: header.live_blocks.load(Ordering::Acquire),
        }
    }

    pub fn is_same(&self, other: &Arena) -> bool {
        Arc::ptr_eq(&self.region, &other.region)
    }

    #[cfg(test)]
    pub(crate) fn magic(&self) -> u64 {
        self.header().magic
    }
}
