use bytes::Bytes;

use crate::error::Result;
use crate::storage::arena::{Arena, ArenaPtr};
use crate::utils::hash::HashFunction;

/// Length-prefixed byte string whose contents live in an arena.
///
/// Bytes are arbitrary; embedded NULs and the empty string are both valid.
/// An empty string owns no block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SharedString {
    ptr: ArenaPtr,
    len: u64,
}

impl SharedString {
    pub const EMPTY: SharedString = SharedString {
        ptr: ArenaPtr::INVALID,
        len: 0,
    };

    /// Copy `bytes` into a fresh arena block.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` when the arena cannot hold the copy. Nothing is
    /// allocated in that case.
    pub fn new(arena: &Arena, bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::EMPTY);
        }

        let ptr = arena.allocate(bytes.len())?;
        // SAFETY: `ptr` is a fresh block of `bytes.len()` bytes owned by us.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), arena.resolve::<u8>(ptr), bytes.len());
        }
        Ok(Self {
            ptr,
            len: bytes.len() as u64,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the contents in place.
    ///
    /// # Safety
    ///
    /// The string must not be freed while the slice is alive, which callers
    /// ensure by holding the lock of the entry that owns it.
    #[inline]
    pub(crate) unsafe fn as_slice<'a>(&self, arena: &'a Arena) -> &'a [u8] {
        if self.len == 0 {
            return &[];
        }
        arena.bytes(self.ptr, self.len as usize)
    }

    /// Copy the contents out of the arena.
    pub(crate) fn to_bytes(&self, arena: &Arena) -> Bytes {
        // SAFETY: the owning entry is locked by the caller.
        Bytes::copy_from_slice(unsafe { self.as_slice(arena) })
    }

    /// Release the backing block. Freeing the empty string is a no-op.
    pub(crate) fn free(self, arena: &Arena) -> Result<()> {
        if self.ptr.is_valid() {
            arena.free(self.ptr)?;
        }
        Ok(())
    }

    /// Compare against local bytes; lengths are compared first.
    #[inline]
    pub(crate) fn eq_bytes(&self, arena: &Arena, other: &[u8]) -> bool {
        self.len as usize == other.len()
            // SAFETY: the owning entry is locked by the caller.
            && unsafe { self.as_slice(arena) } == other
    }

    #[cfg(test)]
    pub(crate) fn eq_shared(&self, arena: &Arena, other: &SharedString) -> bool {
        self.len == other.len
            // SAFETY: both owners are locked by the caller.
            && unsafe { self.as_slice(arena) == other.as_slice(arena) }
    }

    pub(crate) fn hash(&self, arena: &Arena, hash_fn: HashFunction) -> u32 {
        // SAFETY: the owning entry is locked by the caller.
        hash_fn.hash(unsafe { self.as_slice(arena) })
    }
}
