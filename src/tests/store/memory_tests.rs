use crate::constants::*;
use crate::error::KvError;
use crate::KvStore;

fn test_store(namespace: &str, capacity: usize) -> KvStore {
    KvStore::builder()
        .namespace(namespace)
        .arena_capacity(capacity)
        .build()
        .unwrap()
}

// The top-level index may grow the first time a batch of keys goes in, so
// each test runs its workload once to settle the bucket array before taking
// a baseline.
fn settled_baseline(store: &KvStore, workload: impl Fn(&KvStore), keys: &[&[u8]]) -> usize {
    workload(store);
    for key in keys {
        store.del(key).unwrap();
    }
    store.memory_usage().unwrap()
}

#[test]
fn test_del_reclaims_strings() {
    let store = test_store("memory-test-strings", 4 * MB);
    let workload = |store: &KvStore| store.set(b"k", &[7u8; 4096]).unwrap();
    let baseline = settled_baseline(&store, workload, &[&b"k"[..]]);

    workload(&store);
    assert!(store.memory_usage().unwrap() >= baseline + 4096);

    store.del(b"k").unwrap();
    assert_eq!(store.memory_usage().unwrap(), baseline);
}

#[test]
fn test_del_reclaims_collections() {
    let store = test_store("memory-test-collections", 4 * MB);
    let workload = |store: &KvStore| {
        for i in 0..200 {
            let item = format!("item-{}", i);
            store.sadd(b"set", item.as_bytes()).unwrap();
            store.rpush(b"list", item.as_bytes()).unwrap();
            store.hset(b"hash", item.as_bytes(), b"value").unwrap();
        }
    };
    let keys: [&[u8]; 3] = [b"set", b"list", b"hash"];
    let baseline = settled_baseline(&store, workload, &keys);

    workload(&store);
    assert!(store.memory_usage().unwrap() > baseline);

    for key in keys {
        assert!(store.del(key).unwrap());
    }
    assert_eq!(store.memory_usage().unwrap(), baseline);
}

#[test]
fn test_overwrite_releases_old_value() {
    let store = test_store("memory-test-overwrite", 4 * MB);
    let workload = |store: &KvStore| {
        for i in 0..100 {
            store.sadd(b"k", format!("m{}", i).as_bytes()).unwrap();
        }
    };
    let baseline = settled_baseline(&store, workload, &[&b"k"[..]]);

    workload(&store);
    store.set(b"k", b"small").unwrap();
    store.del(b"k").unwrap();
    assert_eq!(store.memory_usage().unwrap(), baseline);
}

#[test]
fn test_out_of_memory_leaves_store_consistent() {
    let store = test_store("memory-test-oom", MIN_ARENA_CAPACITY);

    let result = store.set(b"big", &vec![0u8; MB]);
    assert!(matches!(result.unwrap_err(), KvError::OutOfMemory { .. }));
    assert!(!store.exists(b"big").unwrap());
    assert_eq!(store.len().unwrap(), 0);

    store.set(b"small", b"value").unwrap();
    let result = store.set(b"small", &vec![0u8; MB]);
    assert!(result.is_err());
    assert_eq!(store.get(b"small").unwrap().as_deref(), Some(&b"value"[..]));

    // A failed push never leaves an empty list behind
    let result = store.lpush(b"list", &vec![0u8; MB]);
    assert!(result.is_err());
    assert!(!store.exists(b"list").unwrap());

    assert_eq!(store.stats().unwrap().out_of_memory_errors, 3);
}

#[test]
fn test_fill_arena_until_full() {
    let store = test_store("memory-test-fill", MIN_ARENA_CAPACITY * 4);

    let mut written = 0;
    for i in 0..100_000 {
        match store.set(format!("key:{}", i).as_bytes(), &[1u8; 100]) {
            Ok(()) => written += 1,
            Err(e) => {
                assert!(matches!(e, KvError::OutOfMemory { .. }));
                break;
            }
        }
    }

    assert!(written > 0);
    assert_eq!(store.len().unwrap(), written);

    // Freeing one key makes room for another
    store.del(b"key:0").unwrap();
    store.set(b"key:0", &[2u8; 100]).unwrap();
}
