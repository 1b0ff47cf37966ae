//! Tests for the RFC 6962 tree hasher.

use sha2::{Digest, Sha256};

use crate::TreeHasher;

#[test]
fn test_empty_root_is_sha256_of_empty_string() {
    let expected = hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        .unwrap();
    assert_eq!(TreeHasher.empty_root().to_vec(), expected);
}

#[test]
fn test_leaf_hash_uses_zero_prefix() {
    let hasher = TreeHasher;
    let mut h = Sha256::new();
    h.update([0u8]);
    h.update(b"hello");
    let expected: [u8; 32] = h.finalize().into();

    assert_eq!(hasher.hash_leaf(b"hello"), expected);
    // Without the prefix the digest must differ.
    let plain: [u8; 32] = Sha256::digest(b"hello").into();
    assert_ne!(hasher.hash_leaf(b"hello"), plain);
}

#[test]
fn test_children_hash_uses_one_prefix() {
    let hasher = TreeHasher;
    let left = [1u8; 32];
    let right = [2u8; 32];

    let mut h = Sha256::new();
    h.update([1u8]);
    h.update(left);
    h.update(right);
    let expected: [u8; 32] = h.finalize().into();

    assert_eq!(hasher.hash_children(&left, &right), expected);
}

#[test]
fn test_children_hash_is_order_sensitive() {
    let hasher = TreeHasher;
    let a = hasher.hash_leaf(b"a");
    let b = hasher.hash_leaf(b"b");
    assert_ne!(hasher.hash_children(&a, &b), hasher.hash_children(&b, &a));
}

#[test]
fn test_leaf_and_node_domains_are_separated() {
    // A 64-byte leaf must not collide with an interior node over the
    // same 64 bytes.
    let hasher = TreeHasher;
    let left = [3u8; 32];
    let right = [4u8; 32];
    let mut concat = Vec::new();
    concat.extend_from_slice(&left);
    concat.extend_from_slice(&right);

    assert_ne!(
        hasher.hash_leaf(&concat),
        hasher.hash_children(&left, &right)
    );
}
