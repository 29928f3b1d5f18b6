use bytes::Bytes;
use std::time::Instant;

use crate::core::entry::{wrong_type, Value, ValueKind};
use crate::core::list::ListValue;
use crate::error::Result;

use super::internal::rollback;
use super::KvStore;

#[derive(Clone, Copy)]
enum End {
    Head,
    Tail,
}

impl KvStore {
    /// Push `element` onto the head of the list at `key`, creating the list
    /// if needed.
    ///
    /// # Returns
    ///
    /// The length of the list after the push.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use arenakv::KvStore;
    /// # fn main() -> arenakv::Result<()> {
    /// # let store = KvStore::new("doc-lpush")?;
    /// store.lpush(b"queue", b"a")?;
    /// store.lpush(b"queue", b"b")?;
    /// assert_eq!(store.lpop(b"queue")?.as_deref(), Some(&b"b"[..]));
    /// assert_eq!(store.lpop(b"queue")?.as_deref(), Some(&b"a"[..]));
    /// assert_eq!(store.lpop(b"queue")?, None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn lpush(&self, key: &[u8], element: &[u8]) -> Result<u64> {
        self.push(key, element, End::Head)
    }

    /// Push `element` onto the tail of the list at `key`.
    pub fn rpush(&self, key: &[u8], element: &[u8]) -> Result<u64> {
        self.push(key, element, End::Tail)
    }

    fn push(&self, key: &[u8], element: &[u8], end: End) -> Result<u64> {
        self.validate_key(key)?;
        self.validate_value(element)?;
        let result = self.push_internal(key, element, end);
        self.track(result)
    }

    fn push_internal(&self, key: &[u8], element: &[u8], end: End) -> Result<u64> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let (mut entry, found) = attachment.find_or_insert(key)?;

        let previous = entry.value;
        let fresh = !previous.is_live();
        if fresh {
            entry.value = Value::List(ListValue::EMPTY);
        }

        let pushed = match &mut entry.value {
            Value::List(list) => match end {
                End::Head => list.push_front(arena, element),
                End::Tail => list.push_back(arena, element),
            },
            other => return Err(wrong_type(ValueKind::List, other)),
        };
        let len = match pushed {
            Ok(len) => len,
            Err(e) => {
                if fresh {
                    rollback(entry, found, previous)?;
                }
                return Err(e);
            }
        };
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::List, Self::elapsed_ns(start));
        Ok(len)
    }

    /// Remove and return the head of the list at `key`.
    ///
    /// Returns `None` for an absent key or an empty list. A list emptied by
    /// a pop keeps its key.
    pub fn lpop(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.validate_key(key)?;
        let result = self.lpop_internal(key);
        self.track(result)
    }

    fn lpop_internal(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let start = Instant::now();
        let attachment = self.db.attach()?;
        let arena = attachment.arena();
        let Some(mut entry) = attachment.find_mut(key) else {
            return Ok(None);
        };

        let popped = match &mut entry.value {
            Value::List(list) => list.pop_front(arena)?,
            Value::Invalid | Value::Null => None,
            other => return Err(wrong_type(ValueKind::List, other)),
        };
        drop(entry);

        self.db
            .stats()
            .record_collection_op(ValueKind::List, Self::elapsed_ns(start));
        Ok(popped)
    }

    /// Length of the list at `key`; zero if absent.
    pub fn llen(&self, key: &[u8]) -> Result<u64> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(0);
        };
        let result = match entry.value {
            Value::List(list) => Ok(list.len()),
            Value::Invalid | Value::Null => Ok(0),
            ref other => Err(wrong_type(ValueKind::List, other)),
        };
        drop(entry);
        self.track(result)
    }

    /// Copy out every element of the list at `key`, head to tail.
    pub fn lrange_all(&self, key: &[u8]) -> Result<Vec<Bytes>> {
        self.validate_key(key)?;
        let attachment = self.db.attach()?;
        let Some(entry) = attachment.find(key) else {
            return Ok(Vec::new());
        };
        let result = match entry.value {
            Value::List(list) => Ok(list.to_vec(entry.arena())),
            Value::Invalid | Value::Null => Ok(Vec::new()),
            ref other => Err(wrong_type(ValueKind::List, other)),
        };
        drop(entry);
        self.track(result)
    }
}
