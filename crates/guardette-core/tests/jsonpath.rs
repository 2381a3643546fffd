//! Property tests for the JSON path engine.

use guardette_core::JsonPath;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn flat_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn wildcard_replace_touches_every_member(object in flat_object()) {
        let len = object.len();
        let mut doc = Value::Object(object.clone());

        let replaced = JsonPath::parse("$.*").unwrap().replace(&mut doc, &json!("[REDACTED]"));

        prop_assert_eq!(replaced, len);
        let map = doc.as_object().unwrap();
        prop_assert_eq!(map.len(), len);
        prop_assert!(map.keys().eq(object.keys()));
        prop_assert!(map.values().all(|v| v == "[REDACTED]"));
    }

    #[test]
    fn wildcard_remove_empties_arrays(items in prop::collection::vec(any::<i32>(), 0..20)) {
        let mut doc = json!({"items": items.clone()});

        let removed = JsonPath::parse("$.items[*]").unwrap().remove(&mut doc);

        prop_assert_eq!(removed, items.len());
        prop_assert_eq!(doc, json!({"items": []}));
    }

    #[test]
    fn index_removal_keeps_the_rest_in_order(
        items in prop::collection::vec(any::<i32>(), 1..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let index = pick.index(items.len());
        let mut doc = Value::from(items.clone());

        let removed = JsonPath::parse(&format!("$[{index}]")).unwrap().remove(&mut doc);

        let mut expected = items;
        expected.remove(index);
        prop_assert_eq!(removed, 1);
        prop_assert_eq!(doc, Value::from(expected));
    }

    #[test]
    fn missing_members_are_never_created(object in flat_object()) {
        let mut doc = Value::Object(object.clone());

        let replaced = JsonPath::parse("$.__absent__").unwrap().replace(&mut doc, &Value::Null);

        prop_assert_eq!(replaced, 0);
        prop_assert_eq!(doc, Value::Object(object));
    }
}
