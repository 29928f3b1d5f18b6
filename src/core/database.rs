//! Database handle: one named arena and its top-level index.
//!
//! The shared part ([`DbShared`]) lives in a named segment and is created
//! exactly once per name. Each [`Database`] is a process-local view that
//! attaches to the arena and index on demand. Attaching is idempotent:
//! nested attaches share the first one and only the outermost release
//! detaches.

use std::sync::Arc;

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::core::entry::Entry;
use crate::core::index::{EntryMut, EntryRef, Index, IndexHandle, IndexParams};
use crate::error::Result;
use crate::stats::Statistics;
use crate::storage::{segment, Arena, ArenaHandle, SharedString};
use crate::utils::clock::Clock;

/// Settings used only when a namespace is created.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseOptions {
    pub arena_capacity: usize,
    pub index: IndexParams,
}

#[derive(Debug)]
struct DbMeta {
    arena: ArenaHandle,
    index: IndexHandle,
    name: SharedString,
    created_at: u64,
}

/// State shared by every user of one namespace.
#[derive(Debug)]
pub struct DbShared {
    // Coarse lock over the handle fields only, never over index contents.
    meta: RwLock<DbMeta>,
    stats: Statistics,
}

impl DbShared {
    fn initialize(name: &str, options: &DatabaseOptions, clock: &dyn Clock) -> Result<Self> {
        let arena = Arena::create(options.arena_capacity)?;
        let name_str = SharedString::new(&arena, name.as_bytes())?;
        let index = Index::<Entry>::create(&arena, options.index)?;

        // Pinned last: a failure above unmaps the arena with the last
        // attachment.
        arena.pin();
        debug!(
            "namespace '{}' created on arena {} ({} bytes)",
            name,
            arena.handle().id(),
            arena.capacity()
        );

        Ok(Self {
            meta: RwLock::new(DbMeta {
                arena: arena.handle(),
                index: index.handle(),
                name: name_str,
                created_at: clock.now(),
            }),
            stats: Statistics::new(),
        })
    }
}

#[derive(Clone)]
struct Attached {
    arena: Arena,
    index: Arc<Index<Entry>>,
}

#[derive(Default)]
struct LocalState {
    attached: Option<Attached>,
    depth: usize,
}

/// Process-local handle on a namespace.
pub struct Database {
    name: String,
    shared: Arc<DbShared>,
    keep_attached: bool,
    local: Mutex<LocalState>,
}

impl Database {
    /// Open namespace `name`, creating it if no one has yet.
    ///
    /// `options` and `clock` are only used by the caller that creates it.
    pub fn get_or_create(
        name: &str,
        options: &DatabaseOptions,
        clock: &dyn Clock,
        keep_attached: bool,
    ) -> Result<Self> {
        let (shared, existed) =
            segment::get_or_init(name, || DbShared::initialize(name, options, clock))?;
        if existed {
            debug!("namespace '{}' opened", name);
        }

        Ok(Self {
            name: name.to_owned(),
            shared,
            keep_attached,
            local: Mutex::new(LocalState::default()),
        })
    }

    /// Attach the arena and top-level index, or reuse the current
    /// attachment. The returned guard releases it.
    pub fn attach(&self) -> Result<Attachment<'_>> {
        {
            let mut local = self.local.lock();
            if let Some(attached) = &local.attached {
                let attached = attached.clone();
                local.depth += 1;
                return Ok(Attachment { db: self, attached });
            }
        }

        let (arena_handle, index_handle) = {
            let meta = self.shared.meta.read();
            (meta.arena, meta.index)
        };
        let arena = Arena::attach(arena_handle)?;
        let index = Index::<Entry>::attach(&arena, index_handle)?;

        let mut local = self.local.lock();
        let attached = match &local.attached {
            // Another thread attached this handle while we were resolving.
            Some(existing) => existing.clone(),
            None => {
                debug!("attached to namespace '{}'", self.name);
                let fresh = Attached {
                    arena,
                    index: Arc::new(index),
                };
                local.attached = Some(fresh.clone());
                fresh
            }
        };
        local.depth += 1;
        Ok(Attachment { db: self, attached })
    }

    /// Drop the cached attachment. Shared contents are untouched and
    /// in-flight attachments keep their own reference until released.
    pub fn detach(&self) {
        let released = self.local.lock().attached.take();
        if released.is_some() {
            debug!("detached from namespace '{}'", self.name);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.local.lock().attached.is_some()
    }

    fn release(&self) {
        let released = {
            let mut local = self.local.lock();
            local.depth = local.depth.saturating_sub(1);
            if local.depth == 0 && !self.keep_attached {
                local.attached.take()
            } else {
                None
            }
        };
        if released.is_some() {
            debug!("detached from namespace '{}'", self.name);
        }
    }

    pub fn namespace(&self) -> &str {
        &self.name
    }

    /// Name as recorded in the arena.
    pub fn name(&self) -> Result<String> {
        let attachment = self.attach()?;
        let name = self.shared.meta.read().name;
        Ok(String::from_utf8_lossy(&name.to_bytes(attachment.arena())).into_owned())
    }

    pub fn created_at(&self) -> u64 {
        self.shared.meta.read().created_at
    }

    pub fn arena_handle(&self) -> ArenaHandle {
        self.shared.meta.read().arena
    }

    pub fn stats(&self) -> &Statistics {
        &self.shared.stats
    }

    pub fn shares_segment_with(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// A live attachment. Index operations go through it so callers depend on
/// the database rather than on the index.
pub struct Attachment<'a> {
    db: &'a Database,
    attached: Attached,
}

impl Attachment<'_> {
    pub fn arena(&self) -> &Arena {
        &self.attached.arena
    }

    pub fn index(&self) -> &Index<Entry> {
        &self.attached.index
    }

    pub fn find(&self, key: &[u8]) -> Option<EntryRef<'_, Entry>> {
        self.attached.index.find(key)
    }

    pub fn find_mut(&self, key: &[u8]) -> Option<EntryMut<'_, Entry>> {
        self.attached.index.find_mut(key)
    }

    pub fn find_or_insert(&self, key: &[u8]) -> Result<(EntryMut<'_, Entry>, bool)> {
        self.attached.index.find_or_insert(key)
    }
}

impl Drop for Attachment<'_> {
    fn drop(&mut self) {
        self.db.release();
    }
}
