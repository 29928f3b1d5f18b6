//! # arenakv - Shared-Arena Key-Value Engine
//!
// Copyright 2025 Mehran Toosi
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! arenakv is an embedded key-value store with Redis-like data types whose
//! entire state lives in a shared memory arena. Any number of threads open a
//! namespace by name and operate on the same data directly, without any
//! networking in between.
//!
//! ## Features
//!
//! - **Arena-Relative Storage**: every shared link is an offset into the arena,
//!   never a process address
//! - **Concurrent Index**: bucketed hash index with 128 reader/writer lock
//!   partitions and transparent growth
//! - **Value Kinds**: strings, sets, lists and hashes; sets and hashes are
//!   nested indexes in the same arena
//! - **Named Namespaces**: created once on first use, shared by everyone who
//!   asks for the same name
//! - **Per-Key Expiry**: queryable expiry times with an optional background
//!   sweeper
//! - **Scoped Locking**: locked entries are guards, so every exit path releases
//!   its lock
//! - **Statistics**: per-namespace operation counters and latencies
//!
//! ## Quick Start
//!
//! ```rust
//! use arenakv::KvStore;
//!
//! # fn main() -> arenakv::Result<()> {
//! let store = KvStore::new("quick-start")?;
//!
//! store.set(b"key", b"value")?;
//! assert_eq!(store.get(b"key")?.as_deref(), Some(&b"value"[..]));
//!
//! assert!(store.del(b"key")?);
//! assert_eq!(store.get(b"key")?, None);
//! # Ok(())
//! # }
//! ```
//!
//! ### Collections
//!
//! ```rust
//! use arenakv::{KvStore, ValueKind};
//!
//! # fn main() -> arenakv::Result<()> {
//! let store = KvStore::new("collections")?;
//!
//! store.sadd(b"tags", b"fast")?;
//! store.sadd(b"tags", b"fast")?;
//! assert_eq!(store.scard(b"tags")?, 1);
//!
//! store.lpush(b"jobs", b"a")?;
//! store.lpush(b"jobs", b"b")?;
//! assert_eq!(store.lpop(b"jobs")?.as_deref(), Some(&b"b"[..]));
//!
//! store.hset(b"user:1", b"name", b"Mehran")?;
//! assert_eq!(store.key_type(b"user:1")?, ValueKind::Hash);
//! # Ok(())
//! # }
//! ```
//!
//! ### Sharing a Namespace
//!
//! Stores opened with the same namespace see the same data:
//!
//! ```rust
//! # use arenakv::KvStore;
//! # fn main() -> arenakv::Result<()> {
//! let writer = KvStore::new("shared-ns")?;
//! let reader = KvStore::new("shared-ns")?;
//!
//! writer.set(b"k", b"v")?;
//! assert_eq!(reader.get(b"k")?.as_deref(), Some(&b"v"[..]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture Overview
//!
//! ### Arena
//! A namespace owns one anonymous mapping. A size-class allocator hands out
//! 16-byte aligned blocks from a bump pointer and recycles them through
//! per-class free lists; the allocator state and its lock live in the arena
//! header. Freeing a block that is not live is reported, not absorbed.
//!
//! ### Index
//! Buckets hold singly linked chains. The top 7 bits of a key's hash select a
//! lock partition, the top `n` bits a bucket, so a partition always covers
//! whole buckets. Growth doubles the bucket array while holding every
//! partition lock, so a reader never sees a half-moved table.
//!
//! ### Entries
//! Each key maps to an entry holding the key, an expiry time and a tagged
//! value. Sets and hashes are nested indexes addressed by handle; lists are
//! doubly linked chains of arena-allocated elements.
//!
//! ## Thread Safety
//!
//! All operations are thread-safe and can be called concurrently:
//!
//! ```rust
//! # use arenakv::KvStore;
//! # use std::sync::Arc;
//! # use std::thread;
//! # fn main() -> arenakv::Result<()> {
//! let store = Arc::new(KvStore::new("thread-safety")?);
//! let mut handles = vec![];
//!
//! for i in 0..10 {
//!     let store_clone = Arc::clone(&store);
//!     handles.push(thread::spawn(move || {
//!         let member = format!("member_{}", i);
//!         store_clone.sadd(b"set", member.as_bytes()).unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(store.scard(b"set")?, 10);
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod core;
pub mod error;
pub mod stats;
pub mod storage;
pub mod utils;

pub use crate::core::entry::ValueKind;
pub use crate::core::store::{KvStore, SetCondition, SetOptions, StoreBuilder, StoreConfig};
pub use crate::core::ttl_sweep::TtlConfig;
pub use error::{KvError, Result};
pub use stats::{Statistics, StatsSnapshot};
pub use utils::clock::{Clock, ManualClock, SystemClock};
pub use utils::hash::HashFunction;

#[cfg(test)]
mod tests;
