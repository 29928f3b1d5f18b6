use std::mem;

use bytes::Bytes;

use crate::error::{KvError, Result};
use crate::storage::{Arena, ArenaPtr, SharedString};

/// One arena-allocated list node.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ListElement {
    pub data: SharedString,
    pub prev: ArenaPtr,
    pub next: ArenaPtr,
}

/// Doubly linked list header kept inline in the owning entry.
///
/// An empty list has both ends invalid and size zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListValue {
    pub size: u64,
    pub head: ArenaPtr,
    pub tail: ArenaPtr,
}

impl ListValue {
    pub const EMPTY: ListValue = ListValue {
        size: 0,
        head: ArenaPtr::INVALID,
        tail: ArenaPtr::INVALID,
    };

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn element<'a>(arena: &'a Arena, ptr: ArenaPtr) -> &'a mut ListElement {
        // SAFETY: list elements are only reached through an entry its
        // caller holds exclusively.
        unsafe { &mut *arena.resolve::<ListElement>(ptr) }
    }

    fn new_element(arena: &Arena, bytes: &[u8]) -> Result<ArenaPtr> {
        let data = SharedString::new(arena, bytes)?;
        let ptr = match arena.allocate(mem::size_of::<ListElement>()) {
            Ok(ptr) => ptr,
            Err(e) => {
                data.free(arena)?;
                return Err(e);
            }
        };
        // SAFETY: fresh block sized for a ListElement.
        unsafe {
            arena.resolve::<ListElement>(ptr).write(ListElement {
                data,
                prev: ArenaPtr::INVALID,
                next: ArenaPtr::INVALID,
            });
        }
        Ok(ptr)
    }

    /// Push at the head. Returns the new length.
    pub fn push_front(&mut self, arena: &Arena, bytes: &[u8]) -> Result<u64> {
        let ptr = Self::new_element(arena, bytes)?;
        if self.head.is_valid() {
            Self::element(arena, ptr).next = self.head;
            Self::element(arena, self.head).prev = ptr;
        } else {
            self.tail = ptr;
        }
        self.head = ptr;
        self.size += 1;
        Ok(self.size)
    }

    /// Push at the tail. Returns the new length.
    pub fn push_back(&mut self, arena: &Arena, bytes: &[u8]) -> Result<u64> {
        let ptr = Self::new_element(arena, bytes)?;
        if self.tail.is_valid() {
            Self::element(arena, ptr).prev = self.tail;
            Self::element(arena, self.tail).next = ptr;
        } else {
            self.head = ptr;
        }
        self.tail = ptr;
        self.size += 1;
        Ok(self.size)
    }

    /// Remove the head element and return a copy of its data.
    pub fn pop_front(&mut self, arena: &Arena) -> Result<Option<Bytes>> {
        if !self.head.is_valid() {
            return Ok(None);
        }
        if self.size == 0 {
            return Err(KvError::Corrupted("list size out of sync with its chain"));
        }

        let ptr = self.head;
        let element = *Self::element(arena, ptr);
        let data = element.data.to_bytes(arena);

        self.head = element.next;
        if self.head.is_valid() {
            Self::element(arena, self.head).prev = ArenaPtr::INVALID;
        } else {
            self.tail = ArenaPtr::INVALID;
        }
        self.size -= 1;

        element.data.free(arena)?;
        arena.free(ptr)?;
        Ok(Some(data))
    }

    /// Copy every element out, head to tail.
    pub fn to_vec(&self, arena: &Arena) -> Vec<Bytes> {
        let mut items = Vec::with_capacity(self.size as usize);
        let mut cursor = self.head;
        while cursor.is_valid() {
            let element = Self::element(arena, cursor);
            items.push(element.data.to_bytes(arena));
            cursor = element.next;
        }
        items
    }

    /// Free every element.
    pub fn release(self, arena: &Arena) -> Result<()> {
        let mut cursor = self.head;
        while cursor.is_valid() {
            let element = *Self::element(arena, cursor);
            element.data.free(arena)?;
            arena.free(cursor)?;
            cursor = element.next;
        }
        Ok(())
    }
}
