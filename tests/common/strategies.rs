use proptest::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;

use erp_sync_core::normalization::KEY_ALIASES;

/// Any attribute key: a known alias, a canonical key, or something unrelated.
pub fn attribute_key_strategy() -> impl Strategy<Value = String> {
    let known: Vec<String> = KEY_ALIASES
        .iter()
        .flat_map(|(alias, canonical)| [alias.to_string(), canonical.to_string()])
        .collect();
    prop_oneof![
        prop::sample::select(known),
        "[a-zA-Z][a-zA-Z0-9_]{0,15}",
    ]
}

pub fn attribute_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 -]{0,20}".prop_map(Value::from),
    ]
}

pub fn attributes_strategy() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map(attribute_key_strategy(), attribute_value_strategy(), 0..12)
}
