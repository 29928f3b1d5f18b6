use crate::constants::*;
use crate::core::entry::ValueKind;
use crate::KvStore;

fn test_store(namespace: &str) -> KvStore {
    KvStore::builder()
        .namespace(namespace)
        .arena_capacity(8 * MB)
        .build()
        .unwrap()
}

#[test]
fn test_single_byte_keys() {
    let store = test_store("edge-test-single-byte");

    for b in 0..=255u8 {
        store.set(&[b], &[b]).unwrap();
    }
    assert_eq!(store.len().unwrap(), 256);

    for b in 0..=255u8 {
        assert_eq!(store.get(&[b]).unwrap().as_deref(), Some(&[b][..]));
    }
}

#[test]
fn test_keys_differing_only_in_trailing_nul() {
    let store = test_store("edge-test-trailing-nul");

    store.set(b"key", b"plain").unwrap();
    store.set(b"key\0", b"nul").unwrap();

    assert_eq!(store.get(b"key").unwrap().as_deref(), Some(&b"plain"[..]));
    assert_eq!(store.get(b"key\0").unwrap().as_deref(), Some(&b"nul"[..]));
    assert_eq!(store.len().unwrap(), 2);
}

#[test]
fn test_large_value() {
    let store = test_store("edge-test-large-value");
    let value: Vec<u8> = (0..MB).map(|i| (i % 251) as u8).collect();

    store.set(b"large", &value).unwrap();
    assert_eq!(store.get(b"large").unwrap().unwrap().as_ref(), &value[..]);
}

#[test]
fn test_many_keys_force_growth() {
    let store = test_store("edge-test-growth");

    for i in 0..5000 {
        store
            .set(format!("key-{}", i).as_bytes(), format!("{}", i).as_bytes())
            .unwrap();
    }

    let attachment = store.database().attach().unwrap();
    assert!(attachment.index().bucket_count() > 1 << DEFAULT_BUCKETS_LOG2);
    drop(attachment);

    for i in (0..5000).step_by(97) {
        assert_eq!(
            store.get(format!("key-{}", i).as_bytes()).unwrap().as_deref(),
            Some(format!("{}", i).as_bytes())
        );
    }
}

#[test]
fn test_large_set_grows_nested_index() {
    let store = test_store("edge-test-big-set");

    for i in 0..3000 {
        store.sadd(b"big", format!("{}", i).as_bytes()).unwrap();
    }
    assert_eq!(store.scard(b"big").unwrap(), 3000);
    assert!(store.sismember(b"big", b"2999").unwrap());
    assert!(!store.sismember(b"big", b"3000").unwrap());
}

#[test]
fn test_kind_changes_through_delete() {
    let store = test_store("edge-test-kinds");

    store.set(b"k", b"v").unwrap();
    store.del(b"k").unwrap();
    store.sadd(b"k", b"m").unwrap();
    store.del(b"k").unwrap();
    store.hset(b"k", b"f", b"v").unwrap();
    assert_eq!(store.key_type(b"k").unwrap(), ValueKind::Hash);
    store.set(b"k", b"v2").unwrap();
    assert_eq!(store.key_type(b"k").unwrap(), ValueKind::String);
}

#[test]
fn test_store_reopened_after_drop() {
    {
        let store = test_store("edge-test-reopen");
        store.set(b"persisted", b"yes").unwrap();
    }

    // The namespace outlives every store that used it
    let store = test_store("edge-test-reopen");
    assert_eq!(
        store.get(b"persisted").unwrap().as_deref(),
        Some(&b"yes"[..])
    );
}
