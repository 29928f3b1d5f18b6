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
fn test_hset_overwrites_field() {
    let store = test_store("hashes-test-overwrite");

    assert!(store.hset(b"h", b"f1", b"x").unwrap());
    assert!(!store.hset(b"h", b"f1", b"y").unwrap());

    assert_eq!(store.hget(b"h", b"f1").unwrap().as_deref(), Some(&b"y"[..]));
    assert_eq!(store.hlen(b"h").unwrap(), 1);
    assert_eq!(store.key_type(b"h").unwrap(), ValueKind::Hash);
}

#[test]
fn test_multiple_fields() {
    let store = test_store("hashes-test-fields");

    for i in 0..200 {
        let field = format!("field-{}", i);
        let value = format!("value-{}", i);
        assert!(store.hset(b"h", field.as_bytes(), value.as_bytes()).unwrap());
    }
    assert_eq!(store.hlen(b"h").unwrap(), 200);

    for i in 0..200 {
        let field = format!("field-{}", i);
        let value = format!("value-{}", i);
        assert_eq!(
            store.hget(b"h", field.as_bytes()).unwrap().as_deref(),
            Some(value.as_bytes())
        );
    }
    assert_eq!(store.hget(b"h", b"field-200").unwrap(), None);
}

#[test]
fn test_hdel_and_hexists() {
    let store = test_store("hashes-test-hdel");

    store.hset(b"h", b"a", b"1").unwrap();
    store.hset(b"h", b"b", b"2").unwrap();

    assert!(store.hexists(b"h", b"a").unwrap());
    assert!(store.hdel(b"h", b"a").unwrap());
    assert!(!store.hdel(b"h", b"a").unwrap());
    assert!(!store.hexists(b"h", b"a").unwrap());
    assert!(!store.hdel(b"missing", b"a").unwrap());
    assert_eq!(store.hlen(b"h").unwrap(), 1);

    // Emptied hashes keep their key
    store.hdel(b"h", b"b").unwrap();
    assert_eq!(store.hlen(b"h").unwrap(), 0);
    assert!(store.exists(b"h").unwrap());
}

#[test]
fn test_empty_field_and_value() {
    let store = test_store("hashes-test-empty");

    store.hset(b"h", b"", b"").unwrap();
    assert!(store.hexists(b"h", b"").unwrap());
    assert_eq!(store.hget(b"h", b"").unwrap().as_deref(), Some(&b""[..]));
}

#[test]
fn test_hash_commands_on_wrong_type() {
    let store = test_store("hashes-test-wrong-type");

    store.rpush(b"l", b"e").unwrap();
    assert!(matches!(
        store.hset(b"l", b"f", b"v").unwrap_err(),
        KvError::WrongType {
            expected: ValueKind::Hash,
            found: ValueKind::List
        }
    ));
    assert!(store.hget(b"l", b"f").is_err());
    assert!(store.hdel(b"l", b"f").is_err());
    assert!(store.hlen(b"l").is_err());
    assert!(store.hexists(b"l", b"f").is_err());
    assert_eq!(store.llen(b"l").unwrap(), 1);
}
