//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a reference LRU model and to
//! check that key derivation is deterministic and injective.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;

use crate::cache::{contract_key, query_key, CacheStore};
use crate::collaborators::{ContractCallRequest, IndexerQuery};

// == Test Configuration ==
const TEST_MAX_AGE: Duration = Duration::from_secs(300);

// == Strategies ==
/// Small key space so that operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]{1,2}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: i64 },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        3 => (key_strategy(), any::<i64>()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        2 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Has { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
    ]
}

fn address_strategy() -> impl Strategy<Value = String> {
    "0x[0-9a-fA-F]{40}"
}

/// Strings that include the separator and the escape character
fn component_strategy() -> impl Strategy<Value = String> {
    "[a-z_\\\\]{0,6}"
}

fn arg_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        component_strategy().prop_map(Value::from),
        prop::collection::vec(any::<u8>(), 0..3).prop_map(|v| json!(v)),
    ]
}

fn request(address: &str, method: &str, args: Vec<Value>) -> ContractCallRequest {
    ContractCallRequest {
        address: address.to_string(),
        method: method.to_string(),
        args,
    }
}

fn string_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|s| json!(s)).collect()
}

// == Reference Model ==
/// Most recently used first.
struct LruModel {
    order: VecDeque<String>,
    capacity: usize,
    evictions: u64,
}

impl LruModel {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            capacity,
            evictions: 0,
        }
    }

    fn promote(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_front(key.to_string());
    }

    fn set(&mut self, key: &str) {
        if !self.order.iter().any(|k| k == key) && self.order.len() >= self.capacity {
            self.order.pop_back();
            self.evictions += 1;
        }
        self.promote(key);
    }

    fn get(&mut self, key: &str) -> bool {
        let present = self.order.iter().any(|k| k == key);
        if present {
            self.promote(key);
        }
        present
    }

    fn delete(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The store never holds more than max_items entries.
    #[test]
    fn prop_capacity_bound(
        max_items in 1usize..8,
        keys in prop::collection::vec(key_strategy(), 1..60),
    ) {
        let mut store = CacheStore::new(max_items, TEST_MAX_AGE);

        for key in keys {
            store.set(key, json!(1), None);
            prop_assert!(store.len() <= max_items);
        }
    }

    // Recency order and evictions match a reference LRU for any operation mix.
    #[test]
    fn prop_matches_reference_lru(
        max_items in 1usize..6,
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
    ) {
        let mut store = CacheStore::new(max_items, TEST_MAX_AGE);
        let mut model = LruModel::new(max_items);

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key.clone(), json!(value), None);
                    model.set(&key);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(store.get(&key).is_some(), model.get(&key));
                }
                CacheOp::Has { key } => {
                    prop_assert_eq!(store.has(&key), model.order.contains(&key));
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                    model.delete(&key);
                }
            }
        }

        let dumped: Vec<String> = store.dump().into_iter().map(|(key, _)| key).collect();
        let expected: Vec<String> = model.order.iter().cloned().collect();
        prop_assert_eq!(dumped, expected);
        prop_assert_eq!(store.stats().snapshot().removals, model.evictions);
    }

    // The latest write for a key is what get returns.
    #[test]
    fn prop_last_write_wins(key in key_strategy(), values in prop::collection::vec(any::<i64>(), 1..10)) {
        let mut store = CacheStore::new(4, TEST_MAX_AGE);
        for value in &values {
            store.set(key.clone(), json!(value), None);
        }

        prop_assert_eq!(store.get(&key), values.last().map(|v| json!(v)));
        prop_assert_eq!(store.len(), 1);
    }

    // Equal identities give equal keys, whatever the address casing.
    #[test]
    fn prop_contract_key_deterministic(
        address in address_strategy(),
        method in component_strategy(),
        args in prop::collection::vec(arg_strategy(), 0..4),
    ) {
        let a = contract_key(&request(&address, &method, args.clone())).unwrap();
        let b = contract_key(&request(&address.to_uppercase(), &method, args)).unwrap();
        prop_assert_eq!(a, b);
    }

    // Different string argument lists never share a key, including lists that
    // differ only in order or in where a separator falls.
    #[test]
    fn prop_contract_key_injective(
        method_a in component_strategy(),
        method_b in component_strategy(),
        args_a in prop::collection::vec(component_strategy(), 0..4),
        args_b in prop::collection::vec(component_strategy(), 0..4),
    ) {
        prop_assume!((&method_a, &args_a) != (&method_b, &args_b));

        let a = contract_key(&request("0xabc", &method_a, string_args(&args_a))).unwrap();
        let b = contract_key(&request("0xabc", &method_b, string_args(&args_b))).unwrap();
        prop_assert_ne!(a, b);
    }

    // Object key order and document whitespace do not change a query key.
    #[test]
    fn prop_query_key_canonical(
        fields in prop::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..5),
        pad in "[ \t\n]{1,3}",
    ) {
        let forward: serde_json::Map<String, Value> =
            fields.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
        let reversed: serde_json::Map<String, Value> =
            fields.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();

        let a = IndexerQuery::new("ns", "query { items { id } }").variables(Value::Object(forward));
        let b = IndexerQuery::new("ns", format!("query{pad}{{ items {pad}{{ id }} }}"))
            .variables(Value::Object(reversed));

        prop_assert_eq!(query_key(&a).unwrap(), query_key(&b).unwrap());
    }
}
