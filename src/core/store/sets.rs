use bytes::Bytes;
use std::time::Instant;

use crate::core::entry::{wrong_type, SetMember, Value, ValueKind};
use crate::core::index::Index;
use crate::error::Result;

use super::internal::rollback;
use super::KvStore;

impl KvStore {
    /// Add `member` to the set at `key`, creating the set if needed.
    ///
    /// # Returns
    ///
    /// `true` if the member was not already present.
    ///
    /// # Errors
    ///
    /// * `WrongType` - the key holds a string, list or hash
    /// * `OutOfMemory` - the arena is full; the set is unchanged
    ///
    /// # Example
    ///
    /// ```rust
    /// # use arenakv::KvStore;
    /// # fn main() -> arenakv::Result<()> {
    /// # let store = KvStore::new("doc-sadd")?;
    /// assert!(store.sadd(b"tags", b"rust")?);
    /// assert!(!store.sadd(b"tags", b"rust")?);
    /// assert_eq!(store.scard(b"tags")?, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn sadd(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.validate_value(member)?;
        let result = self.sadd_internal(key, member);
        self.track(result)
    }

    fn sadd_internal(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let (mut entry, found) = attachment.find_or_insert(key)?;

        let previous = entry.value;
        let fresh = !previous.is_live();
        if fresh {
            let members = match Index::<SetMember>::create(arena, self.nested_params) {
                Ok(index) => index.handle(),
                Err(e) => {
                    rollback(entry, found, previous)?;
                    return Err(e);
                }
            };
            entry.value = Value::Set { members, size: 0 };
        }

        let Value::Set { members, .. } = entry.value else {
            return Err(wrong_type(ValueKind::Set, &entry.value));
        };
        let set = Index::<SetMember>::attach(arena, members)?;
        let added = match set.find_or_insert(member) {
            Ok((_, existed)) => !existed,
            Err(e) => {
                if fresh {
                    rollback(entry, found, previous)?;
                }
                return Err(e);
            }
        };

        if added {
            if let Value::Set { size, .. } = &mut entry.value {
                *size += 1;
            }
        }
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Set, Self::elapsed_ns(start));
        Ok(added)
    }

    /// Check whether `member` is in the set at `key`.
    pub fn sismember(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let result = self.sismember_internal(key, member);
        self.track(result)
    }

    fn sismember_internal(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(false);
        };

        let present = match entry.value {
            Value::Set { members, .. } => Index::<SetMember>::attach(entry.arena(), members)?
                .find(member)
                .is_some(),
            Value::Invalid | Value::Null => false,
            ref other => return Err(wrong_type(ValueKind::Set, other)),
        };
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Set, Self::elapsed_ns(start));
        Ok(present)
    }

    /// Remove `member` from the set at `key`.
    ///
    /// # Returns
    ///
    /// `true` if the member was present. The key stays even when its set
    /// becomes empty.
    pub fn srem(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let result = self.srem_internal(key, member);
        self.track(result)
    }

    fn srem_internal(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let Some(mut entry) = attachment.find_mut(key) else {
            return Ok(false);
        };

        let removed = match entry.value {
            Value::Set { members, .. } => {
                Index::<SetMember>::attach(entry.arena(), members)?.delete_key(member)?
            }
            Value::Invalid | Value::Null => false,
            ref other => return Err(wrong_type(ValueKind::Set, other)),
        };
        if removed {
            if let Value::Set { size, .. } = &mut entry.value {
                *size -= 1;
            }
        }
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Set, Self::elapsed_ns(start));
        Ok(removed)
    }

    /// Number of members in the set at `key`; zero if absent.
    pub fn scard(&self, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(0);
        };
        let result = match entry.value {
            Value::Set { size, .. } => Ok(size),
            Value::Invalid | Value::Null => Ok(0),
            ref other => Err(wrong_type(ValueKind::Set, other)),
        };
        drop(entry);
        self.track(result)
    }

    /// Copy out every member of the set at `key`, in no particular order.
    pub fn smembers(&self, key: &[u8]) -> Result<Vec<Bytes>> {
        self.validate_key(key)?;
        let result = self.smembers_internal(key);
        self.track(result)
    }

    fn smembers_internal(&self, key: &[u8]) -> Result<Vec<Bytes>> {
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(Vec::new());
        };

        let members = match entry.value {
            Value::Set { members, size } => {
                let arena = entry.arena();
                let set = Index::<SetMember>::attach(arena, members)?;
                let mut out = Vec::with_capacity(size as usize);
                let mut scan = set.scan(false);
                while let Some(m) = scan.next() {
                    out.push(m.member.to_bytes(arena));
                }
                out
            }
            Value::Invalid | Value::Null => Vec::new(),
            ref other => return Err(wrong_type(ValueKind::Set, other)),
        };
        drop(entry);

        self.db.stats().record_scan();
        Ok(members)
    }
}
