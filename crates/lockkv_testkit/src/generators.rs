//! Property-based test generators using proptest.
//!
//! Provides strategies for generating key sets and workload shapes.

use crate::workload::WorkloadConfig;
use lockkv_core::Key;
use proptest::prelude::*;

/// Strategy for generating keys from a small alphabet, so that generated
/// key sets overlap often.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    prop::string::string_regex("[a-e]")
        .expect("Invalid regex")
        .prop_map(Key::new)
}

/// Strategy for generating record keys accepted by every backend.
pub fn record_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,15}")
        .expect("Invalid regex")
        .prop_filter("Key must not be a path component", |s| s != "." && s != "..")
}

/// Strategy for generating key sets, duplicates included.
pub fn key_set_strategy(max_len: usize) -> impl Strategy<Value = Vec<Key>> {
    prop::collection::vec(key_strategy(), 0..=max_len)
}

/// Strategy for generating several transactions' key sets at once.
pub fn key_sets_strategy(max_sets: usize, max_len: usize) -> impl Strategy<Value = Vec<Vec<Key>>> {
    prop::collection::vec(key_set_strategy(max_len), 1..=max_sets)
}

/// Strategy for generating record payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating small workload configurations.
pub fn workload_strategy() -> impl Strategy<Value = WorkloadConfig> {
    (2usize..20, 0usize..200, any::<u64>())
        .prop_map(|(accounts, operations, seed)| WorkloadConfig::new(accounts, operations).seed(seed))
}
