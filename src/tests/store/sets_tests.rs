use rand::Rng;
use std::collections::HashSet;

use crate::constants::MB;
use crate::core::entry::ValueKind;
use crate::error::KvError;
use crate::KvStore;

fn test_store(namespace: &str) -> KvStore {
    KvStore::builder()
        .namespace(namespace)
        .arena_capacity(4 * MB)
        .build()
        .unwrap()
}

#[test]
fn test_sadd_is_idempotent() {
    let store = test_store("sets-test-idempotent");

    assert!(store.sadd(b"s", b"x").unwrap());
    assert!(!store.sadd(b"s", b"x").unwrap());
    assert_eq!(store.scard(b"s").unwrap(), 1);
    assert!(store.sismember(b"s", b"x").unwrap());
    assert!(!store.sismember(b"s", b"y").unwrap());
    assert_eq!(store.key_type(b"s").unwrap(), ValueKind::Set);
}

#[test]
fn test_srem() {
    let store = test_store("sets-test-srem");

    store.sadd(b"s", b"a").unwrap();
    store.sadd(b"s", b"b").unwrap();

    assert!(store.srem(b"s", b"a").unwrap());
    assert!(!store.srem(b"s", b"a").unwrap());
    assert!(!store.srem(b"missing", b"a").unwrap());
    assert_eq!(store.scard(b"s").unwrap(), 1);

    // Emptied sets keep their key
    assert!(store.srem(b"s", b"b").unwrap());
    assert_eq!(store.scard(b"s").unwrap(), 0);
    assert_eq!(store.key_type(b"s").unwrap(), ValueKind::Set);
    assert!(store.sadd(b"s", b"c").unwrap());
}

#[test]
fn test_smembers() {
    let store = test_store("sets-test-smembers");

    let expected: HashSet<Vec<u8>> = (0..300)
        .map(|i| format!("member-{}", i).into_bytes())
        .collect();
    for member in &expected {
        store.sadd(b"big", member).unwrap();
    }

    let members: HashSet<Vec<u8>> = store
        .smembers(b"big")
        .unwrap()
        .into_iter()
        .map(|b| b.to_vec())
        .collect();
    assert_eq!(members, expected);
    assert_eq!(store.scard(b"big").unwrap(), 300);
}

#[test]
fn test_binary_members() {
    let store = test_store("sets-test-binary");

    assert!(store.sadd(b"s", b"").unwrap());
    assert!(store.sadd(b"s", b"\0").unwrap());
    assert!(store.sadd(b"s", b"a\0b").unwrap());
    assert!(!store.sadd(b"s", b"").unwrap());

    assert_eq!(store.scard(b"s").unwrap(), 3);
    assert!(store.sismember(b"s", b"\0").unwrap());
    assert!(!store.sismember(b"s", b"a").unwrap());
}

#[test]
fn test_set_commands_on_wrong_type() {
    let store = test_store("sets-test-wrong-type");

    store.set(b"str", b"v").unwrap();
    assert!(matches!(
        store.sadd(b"str", b"m").unwrap_err(),
        KvError::WrongType {
            expected: ValueKind::Set,
            found: ValueKind::String
        }
    ));
    assert!(store.sismember(b"str", b"m").is_err());
    assert!(store.srem(b"str", b"m").is_err());
    assert!(store.scard(b"str").is_err());
    assert!(store.smembers(b"str").is_err());

    // The string is untouched
    assert_eq!(store.get(b"str").unwrap().as_deref(), Some(&b"v"[..]));
}

#[test]
fn test_random_operations_match_reference() {
    let store = test_store("sets-test-random");
    let mut rng = rand::rng();
    let mut reference = HashSet::new();

    for _ in 0..5000 {
        let member = format!("m{}", rng.random_range(0..400)).into_bytes();
        if rng.random_bool(0.6) {
            let added = store.sadd(b"s", &member).unwrap();
            assert_eq!(added, reference.insert(member));
        } else {
            let removed = store.srem(b"s", &member).unwrap();
            assert_eq!(removed, reference.remove(&member));
        }
    }

    assert_eq!(store.scard(b"s").unwrap(), reference.len() as u64);
    for member in &reference {
        assert!(store.sismember(b"s", member).unwrap());
    }
}
