//! Property tests for key encoding.

use dsx_core::{key_to_proto, proto_to_key, Key};
use proptest::prelude::*;

/// One path step: kind plus either a numeric id or a name.
fn element_strategy() -> impl Strategy<Value = (String, Result<i64, String>)> {
    (
        prop::string::string_regex("[A-Z][a-zA-Z]{0,8}").expect("Invalid regex"),
        prop_oneof![
            any::<i64>().prop_map(Ok),
            prop::string::string_regex("[a-z0-9]{1,8}")
                .expect("Invalid regex")
                .prop_map(Err),
        ],
    )
}

/// Complete keys up to three levels deep, in an optional namespace.
fn key_strategy() -> impl Strategy<Value = Key> {
    (
        prop::string::string_regex("[a-z]{0,4}").expect("Invalid regex"),
        prop::collection::vec(element_strategy(), 1..4),
    )
        .prop_map(|(namespace, path)| {
            let mut key: Option<Key> = None;
            for (kind, id) in path {
                key = Some(match id {
                    Ok(id) => Key::id_key(kind, id, key),
                    Err(name) => Key::name_key(kind, name, key),
                });
            }
            key.unwrap_or_else(|| Key::id_key("Task", 1, None))
                .with_namespace(namespace)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn encoding_is_stable(key in key_strategy()) {
        prop_assert_eq!(key.encode(), key.clone().encode());
    }

    #[test]
    fn encoding_round_trips(key in key_strategy()) {
        let decoded = Key::decode(&key.encode()).unwrap();
        prop_assert_eq!(decoded, key);
    }

    #[test]
    fn distinct_keys_encode_distinctly(a in key_strategy(), b in key_strategy()) {
        prop_assert_eq!(a == b, a.encode() == b.encode());
    }

    #[test]
    fn child_never_collides_with_parent(key in key_strategy(), id in any::<i64>()) {
        let child = Key::id_key("Task", id, Some(key.clone()));
        prop_assert_ne!(child.encode(), key.encode());
    }

    #[test]
    fn proto_round_trips(key in key_strategy()) {
        let proto = key_to_proto(&key, "demo", "(default)");
        prop_assert_eq!(proto_to_key(&proto).unwrap(), key);
    }
}
