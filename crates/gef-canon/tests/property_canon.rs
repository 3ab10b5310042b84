//! Property-based tests for JCS canonicalization.
//!
//! Mirrors the invariants the protocol relies on: determinism, key-order
//! insensitivity, idempotence, and valid-UTF-8 round-tripping.

use gef_canon::canonicalize_value;
use proptest::prelude::*;
use serde_json::Value;

fn arb_json(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
        any::<i32>().prop_map(|n| Value::Number(n.into())),
        "[a-zA-Z0-9 _-]{0,64}".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 256, 10, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::hash_map("[a-zA-Z_][a-zA-Z0-9_]{0,16}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn canon_is_idempotent(v in arb_json(3)) {
        let first = canonicalize_value(&v).unwrap();
        let reparsed: Value = serde_json::from_slice(&first).unwrap();
        let second = canonicalize_value(&reparsed).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn key_order_does_not_affect_output(
        keys in prop::collection::hash_set("[a-z]{1,8}", 1..6),
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let values: Vec<i32> = (0..keys.len() as i32).collect();

        let mut map1 = serde_json::Map::new();
        for (k, v) in keys.iter().zip(values.iter()) {
            map1.insert(k.clone(), Value::Number((*v).into()));
        }
        let mut map2 = serde_json::Map::new();
        for (k, v) in keys.iter().rev().zip(values.iter().rev()) {
            map2.insert(k.clone(), Value::Number((*v).into()));
        }

        let c1 = canonicalize_value(&Value::Object(map1)).unwrap();
        let c2 = canonicalize_value(&Value::Object(map2)).unwrap();
        prop_assert_eq!(c1, c2);
    }

    #[test]
    fn output_is_valid_utf8_and_round_trips(v in arb_json(3)) {
        let bytes = canonicalize_value(&v).unwrap();
        let s = std::str::from_utf8(&bytes).expect("canonical bytes must be UTF-8");
        let reparsed: Value = serde_json::from_str(s).expect("canonical JSON must parse");
        prop_assert_eq!(v, reparsed);
    }
}

#[test]
fn empty_structures_canonicalize_to_empty_braces_and_brackets() {
    use serde_json::json;
    assert_eq!(canonicalize_value(&json!({})).unwrap(), b"{}");
    assert_eq!(canonicalize_value(&json!([])).unwrap(), b"[]");
}
