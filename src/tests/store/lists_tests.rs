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
fn test_lpush_lpop_order() {
    let store = test_store("lists-test-lpush");

    assert_eq!(store.lpush(b"l", b"a").unwrap(), 1);
    assert_eq!(store.lpush(b"l", b"b").unwrap(), 2);

    assert_eq!(store.lpop(b"l").unwrap().as_deref(), Some(&b"b"[..]));
    assert_eq!(store.lpop(b"l").unwrap().as_deref(), Some(&b"a"[..]));
    assert_eq!(store.lpop(b"l").unwrap(), None);
}

#[test]
fn test_rpush_is_fifo() {
    let store = test_store("lists-test-rpush");

    for item in [&b"1"[..], b"2", b"3"] {
        store.rpush(b"q", item).unwrap();
    }
    assert_eq!(store.llen(b"q").unwrap(), 3);

    let all = store.lrange_all(b"q").unwrap();
    let all: Vec<&[u8]> = all.iter().map(|b| b.as_ref()).collect();
    assert_eq!(all, vec![&b"1"[..], b"2", b"3"]);

    assert_eq!(store.lpop(b"q").unwrap().as_deref(), Some(&b"1"[..]));
    assert_eq!(store.llen(b"q").unwrap(), 2);
}

#[test]
fn test_emptied_list_keeps_key() {
    let store = test_store("lists-test-emptied");

    store.lpush(b"l", b"only").unwrap();
    store.lpop(b"l").unwrap();

    assert_eq!(store.llen(b"l").unwrap(), 0);
    assert_eq!(store.key_type(b"l").unwrap(), ValueKind::List);
    assert_eq!(store.lpop(b"l").unwrap(), None);

    assert_eq!(store.rpush(b"l", b"again").unwrap(), 1);
}

#[test]
fn test_list_commands_on_wrong_type() {
    let store = test_store("lists-test-wrong-type");

    store.hset(b"h", b"f", b"v").unwrap();
    assert!(matches!(
        store.lpush(b"h", b"e").unwrap_err(),
        KvError::WrongType {
            expected: ValueKind::List,
            found: ValueKind::Hash
        }
    ));
    assert!(store.rpush(b"h", b"e").is_err());
    assert!(store.lpop(b"h").is_err());
    assert!(store.llen(b"h").is_err());
    assert!(store.lrange_all(b"h").is_err());
    assert_eq!(store.hlen(b"h").unwrap(), 1);
}
