use bytes::Bytes;
use log::trace;
use std::time::{Duration, Instant};

use crate::constants::NO_EXPIRY;
use crate::core::entry::{wrong_type, Value, ValueKind};
use crate::error::Result;
use crate::storage::SharedString;

use super::internal::rollback;
use super::KvStore;

/// When a conditional set is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetCondition {
    #[default]
    Always,
    /// Only if the key is absent (NX).
    IfAbsent,
    /// Only if the key already exists (XX).
    IfExists,
}

/// Options for [`KvStore::set_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Expire after this long. `None` keeps the key forever.
    pub ttl: Option<Duration>,
    pub condition: SetCondition,
}

impl SetOptions {
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn if_absent(mut self) -> Self {
        self.condition = SetCondition::IfAbsent;
        self
    }

    pub fn if_exists(mut self) -> Self {
        self.condition = SetCondition::IfExists;
        self
    }
}

impl KvStore {
    /// Store a string value, replacing whatever the key held.
    ///
    /// Overwriting a set, list or hash is allowed and tears the old value
    /// down. Any expiry on the key is cleared.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to write (1 byte to 100KB)
    /// * `value` - Arbitrary bytes, possibly empty
    ///
    /// # Errors
    ///
    /// * `InvalidKeySize` / `InvalidValueSize` - size limits exceeded
    /// * `OutOfMemory` - the arena is full; the previous value is untouched
    ///
    /// # Example
    ///
    /// ```rust
    /// # use arenakv::KvStore;
    /// # fn main() -> arenakv::Result<()> {
    /// # let store = KvStore::new("doc-set")?;
    /// store.set(b"greeting", b"hello\0world")?;
    /// assert_eq!(store.get(b"greeting")?.as_deref(), Some(&b"hello\0world"[..]));
    /// # Ok(())
    /// # }
    /// ```
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.set_with(key, value, SetOptions::default()).map(|_| ())
    }

    /// Store a string value that expires after `ttl`.
    pub fn set_ex(&self, key: &[u8], value: &[u8], ttl: Duration) -> Result<()> {
        self.set_with(key, value, SetOptions::default().ttl(ttl))
            .map(|_| ())
    }

    /// Store a string value subject to `options`.
    ///
    /// # Returns
    ///
    /// The stored value, or `None` when the condition prevented the write.
    pub fn set_with(&self, key: &[u8], value: &[u8], options: SetOptions) -> Result<Option<Bytes>> {
        self.validate_key(key)?;
        self.validate_value(value)?;
        let result = self.set_internal(key, value, options);
        self.track(result)
    }

    fn set_internal(&self, key: &[u8], value: &[u8], options: SetOptions) -> Result<Option<Bytes>> {
        let start = Instant::now();
        let expire_at = match options.ttl {
            Some(ttl) => self.expiry_after(ttl),
            None => NO_EXPIRY,
        };

        let attachment = self.db.attach()?;
        let arena = attachment.arena();

        let (mut entry, found) = match options.condition {
            SetCondition::IfExists => match attachment.find_mut(key) {
                Some(entry) if entry.value.is_live() => (entry, true),
                _ => return Ok(None),
            },
            _ => attachment.find_or_insert(key)?,
        };

        if options.condition == SetCondition::IfAbsent && entry.value.is_live() {
            return Ok(None);
        }

        let previous = entry.value;
        let string = match SharedString::new(arena, value) {
            Ok(s) => s,
            Err(e) => {
                if !previous.is_live() {
                    rollback(entry, found, previous)?;
                }
                return Err(e);
            }
        };
        entry.replace_value(arena, Value::String(string))?;
        entry.expire_at = expire_at;
        drop(entry);

        trace!("set {} bytes under a {} byte key", value.len(), key.len());
        self.db
            .stats()
            .record_insert(Self::elapsed_ns(start), previous.is_live());
        Ok(Some(Bytes::copy_from_slice(value)))
    }

    /// Get the string stored under `key`.
    ///
    /// # Returns
    ///
    /// A copy of the value, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// * `WrongType` - the key holds a set, list or hash
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.validate_key(key)?;
        let result = self.get_internal(key);
        self.track(result)
    }

    fn get_internal(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let start = Instant::now();
        let attachment = self.db.attach()?;

        let value = match attachment.find(key) {
            Some(entry) => match entry.value {
                Value::String(s) => Some(s.to_bytes(entry.arena())),
                Value::Invalid | Value::Null => None,
                ref other => return Err(wrong_type(ValueKind::String, other)),
            },
            None => None,
        };

        self.db
            .stats()
            .record_get(Self::elapsed_ns(start), value.is_some());
        Ok(value)
    }
}
