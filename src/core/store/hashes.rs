use bytes::Bytes;
use std::time::Instant;

use crate::core::entry::{wrong_type, HashField, Value, ValueKind};
use crate::core::index::Index;
use crate::error::Result;
use crate::storage::SharedString;

use super::internal::rollback;
use super::KvStore;

impl KvStore {
    /// Set `field` of the hash at `key` to `value`, creating the hash if
    /// needed. An existing field is overwritten in place.
    ///
    /// # Returns
    ///
    /// `true` if the field is new.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use arenakv::KvStore;
    /// # fn main() -> arenakv::Result<()> {
    /// # let store = KvStore::new("doc-hset")?;
    /// store.hset(b"user:1", b"name", b"x")?;
    /// store.hset(b"user:1", b"name", b"y")?;
    /// assert_eq!(store.hget(b"user:1", b"name")?.as_deref(), Some(&b"y"[..]));
    /// assert_eq!(store.hlen(b"user:1")?, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn hset(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        self.validate_value(field)?;
        self.validate_value(value)?;
        let result = self.hset_internal(key, field, value);
        self.track(result)
    }

    fn hset_internal(&self, key: &[u8], field: &[u8], value: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let (mut entry, found) = attachment.find_or_insert(key)?;

        let previous = entry.value;
        let fresh = !previous.is_live();
        if fresh {
            let fields = match Index::<HashField>::create(arena, self.nested_params) {
                Ok(index) => index.handle(),
                Err(e) => {
                    rollback(entry, found, previous)?;
                    return Err(e);
                }
            };
            entry.value = Value::Hash { fields, size: 0 };
        }

        let Value::Hash { fields, .. } = entry.value else {
            return Err(wrong_type(ValueKind::Hash, &entry.value));
        };
        let hash = Index::<HashField>::attach(arena, fields)?;

        let written = hash.find_or_insert(field).and_then(|(mut slot, existed)| {
            match SharedString::new(arena, value) {
                Ok(new_value) => {
                    slot.replace_value(arena, new_value)?;
                    Ok(!existed)
                }
                Err(e) => {
                    if !existed {
                        slot.remove()?;
                    }
                    Err(e)
                }
            }
        });
        let added = match written {
            Ok(added) => added,
            Err(e) => {
                if fresh {
                    rollback(entry, found, previous)?;
                }
                return Err(e);
            }
        };

        if added {
            if let Value::Hash { size, .. } = &mut entry.value {
                *size += 1;
            }
        }
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Hash, Self::elapsed_ns(start));
        Ok(added)
    }

    /// Get `field` of the hash at `key`.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>> {
        self.validate_key(key)?;
        let result = self.hget_internal(key, field);
        self.track(result)
    }

    fn hget_internal(&self, key: &[u8], field: &[u8]) -> Result<Option<Bytes>> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(None);
        };

        let value = match entry.value {
            Value::Hash { fields, .. } => {
                let arena = entry.arena();
                let hash = Index::<HashField>::attach(arena, fields)?;
                let value = hash.find(field).map(|f| f.value.to_bytes(arena));
                value
            }
            Value::Invalid | Value::Null => None,
            ref other => return Err(wrong_type(ValueKind::Hash, other)),
        };
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Hash, Self::elapsed_ns(start));
        Ok(value)
    }

    /// Remove `field` from the hash at `key`.
    ///
    /// # Returns
    ///
    /// `true` if the field was present.
    pub fn hdel(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let result = self.hdel_internal(key, field);
        self.track(result)
    }

    fn hdel_internal(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let Some(mut entry) = attachment.find_mut(key) else {
            return Ok(false);
        };

        let fields = match entry.value {
            Value::Hash { fields, .. } => fields,
            Value::Invalid | Value::Null => return Ok(false),
            ref other => return Err(wrong_type(ValueKind::Hash, other)),
        };
        let hash = Index::<HashField>::attach(arena, fields)?;
        let removed = match hash.find_mut(field) {
            Some(slot) => {
                slot.value.free(arena)?;
                slot.remove()?;
                true
            }
            None => false,
        };

        if removed {
            if let Value::Hash { size, .. } = &mut entry.value {
                *size -= 1;
            }
        }
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::Hash, Self::elapsed_ns(start));
        Ok(removed)
    }

    /// Number of fields in the hash at `key`; zero if absent.
    pub fn hlen(&self, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(0);
        };
        let result = match entry.value {
            Value::Hash { size, .. } => Ok(size),
            Value::Invalid | Value::Null => Ok(0),
            ref other => Err(wrong_type(ValueKind::Hash, other)),
        };
        drop(entry);
        self.track(result)
    }

    /// Check whether the hash at `key` has `field`.
    pub fn hexists(&self, key: &[u8], field: &[u8]) -> Result<bool> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(false);
        };
        let result = match entry.value {
            Value::Hash { fields, .. } => Index::<HashField>::attach(entry.arena(), fields)
                .map(|hash| hash.find(field).is_some()),
            Value::Invalid | Value::Null => Ok(false),
            ref other => Err(wrong_type(ValueKind::Hash, other)),
        };
        drop(entry);
        self.track(result)
    }
}
