//! Tests for the merkle crate.

mod compact_tests;
mod hasher_tests;

use crate::TreeHasher;

/// Deterministic leaf hashes for tests: `hash_leaf("leaf-<i>")`.
pub(crate) fn test_leaves(count: usize) -> Vec<[u8; 32]> {
    let hasher = TreeHasher;
    (0..count)
        .map(|i| hasher.hash_leaf(format!("leaf-{i}").as_bytes()))
        .collect()
}
