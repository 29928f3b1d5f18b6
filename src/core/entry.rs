use std::fmt;
use std::mem;

use log::debug;

use crate::constants::NO_EXPIRY;
use crate::core::index::{Index, IndexEntry, IndexHandle};
use crate::core::list::ListValue;
use crate::error::{KvError, Result};
use crate::storage::{Arena, SharedString};

/// Kind of value a key holds, as reported by type queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Invalid,
    Null,
    String,
    Set,
    List,
    Hash,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Invalid => "invalid",
            ValueKind::Null => "null",
            ValueKind::String => "string",
            ValueKind::Set => "set",
            ValueKind::List => "list",
            ValueKind::Hash => "hash",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value stored under a top-level key.
///
/// Sets and hashes are nested indexes addressed by handle; lists are chains
/// of arena-allocated elements. `size` always equals the number of live
/// members of the nested structure.
#[repr(C, u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Value {
    /// Freshly inserted entry that has not been filled yet.
    #[default]
    Invalid,
    Null,
    String(SharedString),
    Set { members: IndexHandle, size: u64 },
    List(ListValue),
    Hash { fields: IndexHandle, size: u64 },
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Invalid => ValueKind::Invalid,
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
            Value::Set { .. } => ValueKind::Set,
            Value::List(_) => ValueKind::List,
            Value::Hash { .. } => ValueKind::Hash,
        }
    }

    /// Whether the value holds data. Unfilled and null entries behave as an
    /// absent key.
    pub fn is_live(&self) -> bool {
        !matches!(self, Value::Invalid | Value::Null)
    }

    /// Release everything the value owns in the arena, recursively.
    pub fn release(self, arena: &Arena) -> Result<()> {
        match self {
            Value::Invalid | Value::Null => Ok(()),
            Value::String(s) => s.free(arena),
            Value::Set { members, size } => {
                Index::<SetMember>::attach(arena, members)?.destroy_with(|_| Ok(()))?;
                debug!("released set of {} members", size);
                Ok(())
            }
            Value::List(list) => list.release(arena),
            Value::Hash { fields, size } => {
                Index::<HashField>::attach(arena, fields)?
                    .destroy_with(|field| field.value.free(arena))?;
                debug!("released hash of {} fields", size);
                Ok(())
            }
        }
    }
}

/// Error for an operation applied to a key of another kind.
pub(crate) fn wrong_type(expected: ValueKind, found: &Value) -> KvError {
    KvError::WrongType {
        expected,
        found: found.kind(),
    }
}

/// Record stored per key in the top-level index.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub key: SharedString,
    /// Expiry in clock nanoseconds, [`NO_EXPIRY`] for none.
    pub expire_at: u64,
    pub value: Value,
}

impl Entry {
    pub fn expiry(&self) -> Option<u64> {
        (self.expire_at != NO_EXPIRY).then_some(self.expire_at)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expire_at != NO_EXPIRY && self.expire_at <= now
    }

    /// Store `value` and release the one it replaces. The new value must be
    /// fully built before this is called.
    pub fn replace_value(&mut self, arena: &Arena, value: Value) -> Result<()> {
        mem::replace(&mut self.value, value).release(arena)
    }

    /// Release the value and leave the entry unfilled.
    pub fn take_value(&mut self, arena: &Arena) -> Result<()> {
        self.replace_value(arena, Value::Invalid)
    }
}

impl IndexEntry for Entry {
    const TAG: u32 = 0x4B45_5931; // "KEY1"

    fn key(&self) -> SharedString {
        self.key
    }

    fn key_matches(&self, arena: &Arena, key: &[u8]) -> bool {
        self.key.eq_bytes(arena, key)
    }

    fn create(arena: &Arena, key: &[u8]) -> Result<Self> {
        Ok(Self {
            key: SharedString::new(arena, key)?,
            expire_at: NO_EXPIRY,
            value: Value::Invalid,
        })
    }

    fn release_key(&self, arena: &Arena) -> Result<()> {
        self.key.free(arena)
    }
}

/// Member of a set. The member string is the whole entry.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SetMember {
    pub member: SharedString,
}

impl IndexEntry for SetMember {
    const TAG: u32 = 0x534D_4231; // "SMB1"

    fn key(&self) -> SharedString {
        self.member
    }

    fn key_matches(&self, arena: &Arena, key: &[u8]) -> bool {
        self.member.eq_bytes(arena, key)
    }

    fn create(arena: &Arena, key: &[u8]) -> Result<Self> {
        Ok(Self {
            member: SharedString::new(arena, key)?,
        })
    }

    fn release_key(&self, arena: &Arena) -> Result<()> {
        self.member.free(arena)
    }
}

/// Field of a hash and its value.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HashField {
    pub field: SharedString,
    pub value: SharedString,
}

impl HashField {
    pub fn replace_value(&mut self, arena: &Arena, value: SharedString) -> Result<()> {
        mem::replace(&mut self.value, value).free(arena)
    }
}

impl IndexEntry for HashField {
    const TAG: u32 = 0x4846_4431; // "HFD1"

    fn key(&self) -> SharedString {
        self.field
    }

    fn key_matches(&self, arena: &Arena, key: &[u8]) -> bool {
        self.field.eq_bytes(arena, key)
    }

    fn create(arena: &Arena, key: &[u8]) -> Result<Self> {
        Ok(Self {
            field: SharedString::new(arena, key)?,
            value: SharedString::EMPTY,
        })
    }

    fn release_key(&self, arena: &Arena) -> Result<()> {
        self.field.free(arena)
    }
}
