use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crate::constants::MB;
use crate::KvStore;

fn shared_store(namespace: &str) -> Arc<KvStore> {
    Arc::new(
        KvStore::builder()
            .namespace(namespace)
            .arena_capacity(32 * MB)
            .build()
            .unwrap(),
    )
}

#[test]
fn test_concurrent_sadd_distinct_members() {
    let store = shared_store("concurrency-test-sadd");
    let num_threads = 8;
    let per_thread = 500;
    let mut handles = vec![];

    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                let member = format!("t{}-m{}", t, i);
                assert!(store.sadd(b"shared-set", member.as_bytes()).unwrap());
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.scard(b"shared-set").unwrap(), num_threads * per_thread);
    assert_eq!(store.smembers(b"shared-set").unwrap().len(), 4000);
}

#[test]
fn test_concurrent_sadd_same_members() {
    let store = shared_store("concurrency-test-same");
    let mut handles = vec![];

    for _ in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut added = 0u64;
            for i in 0..200 {
                if store.sadd(b"set", format!("m{}", i).as_bytes()).unwrap() {
                    added += 1;
                }
            }
            added
        }));
    }

    let added: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(added, 200);
    assert_eq!(store.scard(b"set").unwrap(), 200);
}

#[test]
fn test_concurrent_writers_separate_stores() {
    let namespace = "concurrency-test-stores";
    // Each thread opens its own store on the same namespace
    let mut handles = vec![];

    for t in 0..8 {
        handles.push(thread::spawn(move || {
            let store = KvStore::builder()
                .namespace(namespace)
                .arena_capacity(32 * MB)
                .build()
                .unwrap();
            for i in 0..250 {
                let key = format!("t{}:k{}", t, i);
                store.set(key.as_bytes(), key.as_bytes()).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let store = KvStore::new(namespace).unwrap();
    assert_eq!(store.len().unwrap(), 2000);
    assert_eq!(
        store.get(b"t3:k100").unwrap().as_deref(),
        Some(&b"t3:k100"[..])
    );
}

#[test]
fn test_concurrent_mixed_commands() {
    let store = shared_store("concurrency-test-mixed");
    let mut handles = vec![];

    for t in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..300 {
                let key = format!("t{}:{}", t, i % 10);
                match i % 4 {
                    0 => {
                        store.rpush(format!("list{}", t).as_bytes(), b"e").unwrap();
                    }
                    1 => {
                        store
                            .hset(b"hash", key.as_bytes(), format!("{}", i).as_bytes())
                            .unwrap();
                    }
                    2 => {
                        store.set(key.as_bytes(), b"v").unwrap();
                    }
                    _ => {
                        store.del(key.as_bytes()).unwrap();
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    for t in 0..4 {
        assert_eq!(store.llen(format!("list{}", t).as_bytes()).unwrap(), 75);
    }
    assert!(store.hlen(b"hash").unwrap() <= 40);
}

#[test]
fn test_concurrent_list_pushes_and_pops() {
    let store = shared_store("concurrency-test-list");

    let pushers: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..250 {
                    store
                        .rpush(b"queue", format!("{}-{}", t, i).as_bytes())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in pushers {
        handle.join().unwrap();
    }
    assert_eq!(store.llen(b"queue").unwrap(), 1000);

    let poppers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut popped = 0;
                while store.lpop(b"queue").unwrap().is_some() {
                    popped += 1;
                }
                popped
            })
        })
        .collect();
    let popped: usize = poppers.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(popped, 1000);
    assert_eq!(store.llen(b"queue").unwrap(), 0);
}

#[test]
fn test_growth_during_scan_keeps_every_key_once() {
    let store = Arc::new(
        KvStore::builder()
            .namespace("concurrency-test-growth-scan")
            .arena_capacity(64 * MB)
            .build()
            .unwrap(),
    );
    let base: Vec<String> = (0..2000).map(|i| format!("base-{}", i)).collect();
    for key in &base {
        store.set(key.as_bytes(), b"v").unwrap();
    }
    let buckets_before = store.database().attach().unwrap().index().bucket_count();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..30000 {
                store.set(format!("grow-{}", i).as_bytes(), b"v").unwrap();
            }
            done.store(true, Ordering::Release);
        })
    };

    loop {
        let finished = done.load(Ordering::Acquire);
        let mut seen: HashMap<Vec<u8>, usize> = HashMap::new();
        for key in store.keys().unwrap() {
            *seen.entry(key.to_vec()).or_default() += 1;
        }
        assert!(seen.values().all(|&n| n == 1), "a key was returned twice");
        for key in &base {
            assert_eq!(seen.get(key.as_bytes()), Some(&1), "lost {}", key);
        }
        if finished {
            break;
        }
    }
    writer.join().unwrap();

    assert_eq!(store.len().unwrap(), 32000);
    let attachment = store.database().attach().unwrap();
    assert!(attachment.index().bucket_count() > buckets_before);
}

#[test]
fn test_concurrent_collection_updates_keep_sizes() {
    let store = shared_store("concurrency-test-sizes");
    let num_threads = 8;
    let mut handles = vec![];

    for t in 0..num_threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..400 {
                let field = format!("t{}-f{}", t, i);
                assert!(store.hset(b"hash", field.as_bytes(), b"v").unwrap());
                store.lpush(b"list", field.as_bytes()).unwrap();
                if i % 2 == 1 {
                    let previous = format!("t{}-f{}", t, i - 1);
                    assert!(store.hdel(b"hash", previous.as_bytes()).unwrap());
                    assert!(store.lpop(b"list").unwrap().is_some());
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.hlen(b"hash").unwrap(), 1600);
    assert_eq!(store.llen(b"list").unwrap(), 1600);
    assert_eq!(store.lrange_all(b"list").unwrap().len(), 1600);
    for t in 0..num_threads {
        for i in 0..400 {
            let field = format!("t{}-f{}", t, i);
            assert_eq!(store.hexists(b"hash", field.as_bytes()).unwrap(), i % 2 == 1);
        }
    }
}
