use std::sync::Arc;

use crate::constants::*;
use crate::core::entry::{HashField, SetMember, Value};
use crate::core::index::Index;
use crate::error::KvError;
use crate::utils::clock::ManualClock;
use crate::{HashFunction, KvStore, StoreConfig};

#[test]
fn test_builder_default() {
    let store = KvStore::builder()
        .namespace("builder-test-default")
        .build()
        .unwrap();

    assert_eq!(store.name().unwrap(), "builder-test-default");
    assert!(store.is_empty().unwrap());
    assert!(!store.database().is_attached());
}

#[test]
fn test_builder_all_options() {
    let clock = Arc::new(ManualClock::new(42));
    let store = KvStore::builder()
        .namespace("builder-test-options")
        .arena_capacity(8 * MB)
        .initial_buckets_log2(10)
        .hash_function(HashFunction::Murmur3)
        .max_load_percent(50)
        .keep_attached(true)
        .clock(clock)
        .build()
        .unwrap();

    assert_eq!(store.created_at(), 42);
    store.set(b"key", b"value").unwrap();
    assert!(store.database().is_attached());

    let attachment = store.database().attach().unwrap();
    assert_eq!(attachment.index().bucket_count(), 1024);
    assert_eq!(attachment.index().hash_function(), HashFunction::Murmur3);
    assert!(attachment.arena().capacity() >= 8 * MB);
}

#[test]
fn test_new_uses_defaults() {
    let store = KvStore::new("builder-test-new").unwrap();
    let attachment = store.database().attach().unwrap();
    assert_eq!(attachment.index().bucket_count(), 1 << DEFAULT_BUCKETS_LOG2);
    assert!(attachment.arena().capacity() >= DEFAULT_ARENA_CAPACITY);
}

#[test]
fn test_builder_validation() {
    let result = KvStore::builder().namespace("").build();
    assert!(matches!(result, Err(KvError::InvalidConfig(_))));

    let result = KvStore::builder()
        .namespace("n".repeat(MAX_NAMESPACE_LEN + 1))
        .build();
    assert!(matches!(result, Err(KvError::InvalidConfig(_))));

    let result = KvStore::builder()
        .namespace("builder-test-bad-buckets")
        .initial_buckets_log2(3)
        .build();
    assert!(matches!(result, Err(KvError::InvalidConfig(_))));

    let result = KvStore::builder()
        .namespace("builder-test-bad-load")
        .max_load_percent(0)
        .build();
    assert!(matches!(result, Err(KvError::InvalidConfig(_))));

    let result = KvStore::builder()
        .namespace("builder-test-bad-capacity")
        .arena_capacity(16)
        .build();
    assert!(matches!(result, Err(KvError::InvalidConfig(_))));
}

#[test]
fn test_same_namespace_shares_data() {
    let a = KvStore::builder()
        .namespace("builder-test-shared")
        .arena_capacity(4 * MB)
        .build()
        .unwrap();
    let b = KvStore::new("builder-test-shared").unwrap();

    a.set(b"from-a", b"1").unwrap();
    b.sadd(b"from-b", b"m").unwrap();

    assert_eq!(b.get(b"from-a").unwrap().as_deref(), Some(&b"1"[..]));
    assert!(a.sismember(b"from-b", b"m").unwrap());
    assert_eq!(a.len().unwrap(), 2);
    assert!(a.database().shares_segment_with(b.database()));

    // Creation settings come from the first store
    let attachment = b.database().attach().unwrap();
    assert!(attachment.arena().capacity() < DEFAULT_ARENA_CAPACITY);
}

#[test]
fn test_nested_indexes_follow_namespace_settings() {
    let creator = KvStore::builder()
        .namespace("builder-test-nested-params")
        .arena_capacity(4 * MB)
        .hash_function(HashFunction::Murmur3)
        .max_load_percent(50)
        .build()
        .unwrap();
    let other = KvStore::builder()
        .namespace("builder-test-nested-params")
        .hash_function(HashFunction::Default)
        .max_load_percent(90)
        .build()
        .unwrap();

    other.sadd(b"set", b"m").unwrap();
    other.hset(b"hash", b"f", b"v").unwrap();
    assert!(creator.sismember(b"set", b"m").unwrap());
    assert_eq!(creator.hget(b"hash", b"f").unwrap().as_deref(), Some(&b"v"[..]));

    let attachment = other.database().attach().unwrap();
    let arena = attachment.arena();
    assert_eq!(attachment.index().hash_function(), HashFunction::Murmur3);
    assert_eq!(attachment.index().max_load_percent(), 50);

    let set = attachment.find(b"set").unwrap();
    let Value::Set { members, .. } = set.value else {
        panic!("expected a set");
    };
    let members = Index::<SetMember>::attach(arena, members).unwrap();
    assert_eq!(members.hash_function(), HashFunction::Murmur3);
    assert_eq!(members.max_load_percent(), 50);
    drop(set);

    let hash = attachment.find(b"hash").unwrap();
    let Value::Hash { fields, .. } = hash.value else {
        panic!("expected a hash");
    };
    let fields = Index::<HashField>::attach(arena, fields).unwrap();
    assert_eq!(fields.hash_function(), HashFunction::Murmur3);
    assert_eq!(fields.max_load_percent(), 50);
}

#[test]
fn test_distinct_namespaces_are_isolated() {
    let a = KvStore::new("builder-test-iso-a").unwrap();
    let b = KvStore::new("builder-test-iso-b").unwrap();

    a.set(b"key", b"a").unwrap();
    assert_eq!(b.get(b"key").unwrap(), None);
    assert!(!a.database().shares_segment_with(b.database()));
}

#[test]
fn test_with_config() {
    let config = StoreConfig {
        namespace: "builder-test-config".to_string(),
        arena_capacity: 2 * MB,
        ..StoreConfig::default()
    };
    let store = KvStore::with_config(config).unwrap();
    store.set(b"k", b"v").unwrap();
    assert_eq!(store.get(b"k").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn test_config_debug_output() {
    let config = StoreConfig::default();
    let output = format!("{:?}", config);
    assert!(output.contains(DEFAULT_NAMESPACE));
    assert!(output.contains("arena_capacity"));
}
