use std::collections::HashSet;

use crate::constants::MB;
use crate::core::entry::ValueKind;
use crate::KvStore;

fn test_store(namespace: &str) -> KvStore {
    KvStore::builder()
        .namespace(namespace)
        .arena_capacity(4 * MB)
        .build()
        .unwrap()
}

#[test]
fn test_item_counts_by_kind() {
    let store = test_store("keyspace-test-counts");

    store.set(b"string", b"value").unwrap();
    store.sadd(b"set", b"a").unwrap();
    store.sadd(b"set", b"b").unwrap();
    store.rpush(b"list", b"1").unwrap();
    store.rpush(b"list", b"2").unwrap();
    store.rpush(b"list", b"3").unwrap();
    store.hset(b"hash", b"f", b"v").unwrap();

    assert_eq!(store.len().unwrap(), 4);
    assert_eq!(store.key_type(b"string").unwrap(), ValueKind::String);
    assert_eq!(store.key_type(b"set").unwrap(), ValueKind::Set);
    assert_eq!(store.key_type(b"list").unwrap(), ValueKind::List);
    assert_eq!(store.key_type(b"hash").unwrap(), ValueKind::Hash);
    assert_eq!(store.scard(b"set").unwrap(), 2);
    assert_eq!(store.llen(b"list").unwrap(), 3);
    assert_eq!(store.hlen(b"hash").unwrap(), 1);
}

#[test]
fn test_del() {
    let store = test_store("keyspace-test-del");

    store.set(b"key", b"value").unwrap();
    assert!(store.del(b"key").unwrap());
    assert!(!store.exists(b"key").unwrap());
    assert_eq!(store.get(b"key").unwrap(), None);

    assert!(!store.del(b"key").unwrap());
    assert!(!store.del(b"never").unwrap());
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_del_then_reuse_as_other_kind() {
    let store = test_store("keyspace-test-reuse");

    store.sadd(b"k", b"m").unwrap();
    store.del(b"k").unwrap();

    // A deleted key starts over with no kind attached
    assert_eq!(store.lpush(b"k", b"e").unwrap(), 1);
    assert_eq!(store.key_type(b"k").unwrap(), ValueKind::List);
}

#[test]
fn test_keys() {
    let store = test_store("keyspace-test-keys");

    let expected: HashSet<Vec<u8>> = (0..500).map(|i| format!("key:{}", i).into_bytes()).collect();
    for key in &expected {
        store.set(key, b"v").unwrap();
    }

    let keys: HashSet<Vec<u8>> = store
        .keys()
        .unwrap()
        .into_iter()
        .map(|k| k.to_vec())
        .collect();
    assert_eq!(keys, expected);
}

#[test]
fn test_flush_all() {
    let store = test_store("keyspace-test-flush");

    for i in 0..100 {
        store.set(format!("s{}", i).as_bytes(), b"v").unwrap();
    }
    store.sadd(b"set", b"m").unwrap();
    store.lpush(b"list", b"e").unwrap();
    store.hset(b"hash", b"f", b"v").unwrap();

    assert_eq!(store.flush_all().unwrap(), 103);
    assert!(store.is_empty().unwrap());
    assert!(store.keys().unwrap().is_empty());
    assert_eq!(store.flush_all().unwrap(), 0);

    // Namespace is still usable
    store.set(b"after", b"flush").unwrap();
    assert_eq!(store.len().unwrap(), 1);
}
