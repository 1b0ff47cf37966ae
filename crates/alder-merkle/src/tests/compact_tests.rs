//! Tests for the compact Merkle tree.

use std::collections::HashMap;

use super::test_leaves;
use crate::proof::reference_root;
use crate::{CompactTree, MerkleError, TreeHasher};

/// Append all leaves, collecting emitted nodes into a map keyed by
/// coordinate (mirrors what the sequencer does).
fn build_tree(leaves: &[[u8; 32]]) -> (CompactTree, HashMap<(u8, u64), [u8; 32]>) {
    let mut tree = CompactTree::new(TreeHasher);
    let mut nodes = HashMap::new();

    for (i, leaf) in leaves.iter().enumerate() {
        let seq = tree.append(*leaf, |level, index, hash| {
            nodes.insert((level, index), hash);
        });
        assert_eq!(seq, i as u64, "sequence numbers must be dense");
        // The leaf node itself is recorded by the caller.
        nodes.insert((0, seq), *leaf);
    }

    (tree, nodes)
}

#[test]
fn test_empty_tree_root() {
    let tree = CompactTree::new(TreeHasher);
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.current_root(), TreeHasher.empty_root());
}

#[test]
fn test_single_leaf_root_is_leaf_hash() {
    let leaves = test_leaves(1);
    let (tree, _) = build_tree(&leaves);
    assert_eq!(tree.size(), 1);
    assert_eq!(tree.current_root(), leaves[0]);
}

#[test]
fn test_two_leaf_root() {
    let hasher = TreeHasher;
    let leaves = test_leaves(2);
    let (tree, _) = build_tree(&leaves);
    assert_eq!(
        tree.current_root(),
        hasher.hash_children(&leaves[0], &leaves[1])
    );
}

#[test]
fn test_root_matches_reference_for_all_sizes_up_to_64() {
    let hasher = TreeHasher;
    let leaves = test_leaves(64);

    let mut tree = CompactTree::new(hasher);
    for (i, leaf) in leaves.iter().enumerate() {
        tree.append(*leaf, |_, _, _| {});
        let expected = reference_root(&hasher, &leaves[..=i]);
        assert_eq!(
            tree.current_root(),
            expected,
            "root mismatch at size {}",
            i + 1
        );
    }
}

#[test]
fn test_append_emits_parents_of_merged_subtrees() {
    let hasher = TreeHasher;
    let leaves = test_leaves(4);
    let (_, nodes) = build_tree(&leaves);

    // Complete tree of 4 leaves: 4 leaf nodes, 2 level-1 nodes, 1 root.
    assert_eq!(nodes.len(), 7);
    assert_eq!(
        nodes[&(1, 0)],
        hasher.hash_children(&leaves[0], &leaves[1])
    );
    assert_eq!(
        nodes[&(1, 1)],
        hasher.hash_children(&leaves[2], &leaves[3])
    );
    assert_eq!(
        nodes[&(2, 0)],
        hasher.hash_children(&nodes[&(1, 0)], &nodes[&(1, 1)])
    );
}

#[test]
fn test_append_to_even_size_emits_nothing() {
    let leaves = test_leaves(3);
    let mut tree = CompactTree::new(TreeHasher);
    tree.append(leaves[0], |_, _, _| {});
    tree.append(leaves[1], |_, _, _| {});

    // Appending to an even-sized tree creates no interior nodes.
    let mut emitted = 0;
    tree.append(leaves[2], |_, _, _| emitted += 1);
    assert_eq!(emitted, 0);
}

#[test]
fn test_hydration_round_trip_for_all_sizes() {
    let hasher = TreeHasher;
    let leaves = test_leaves(20);

    for size in 1..=leaves.len() {
        let (built, nodes) = build_tree(&leaves[..size]);
        let root = built.current_root();

        let hydrated =
            CompactTree::from_state(hasher, size as u64, &root, |level, index| {
                nodes
                    .get(&(level, index))
                    .copied()
                    .ok_or(MerkleError::MissingNode(alder_types::NodeId::new(
                        level, index,
                    )))
            })
            .unwrap_or_else(|e| panic!("hydration failed at size {size}: {e}"));

        assert_eq!(hydrated.size(), size as u64);
        assert_eq!(hydrated.current_root(), root);
    }
}

#[test]
fn test_hydrated_tree_continues_appending_correctly() {
    let hasher = TreeHasher;
    let leaves = test_leaves(13);

    // Build the first 7 leaves, hydrate at size 7, append the rest.
    let (built, nodes) = build_tree(&leaves[..7]);
    let root = built.current_root();

    let mut hydrated = CompactTree::from_state(hasher, 7, &root, |level, index| {
        Ok(nodes[&(level, index)])
    })
    .unwrap();

    for leaf in &leaves[7..] {
        hydrated.append(*leaf, |_, _, _| {});
    }

    assert_eq!(hydrated.current_root(), reference_root(&hasher, &leaves));
}

#[test]
fn test_hydration_detects_corrupt_root() {
    let leaves = test_leaves(5);
    let (built, nodes) = build_tree(&leaves);
    let mut root = built.current_root();
    root[0] ^= 0xFF;

    let result = CompactTree::from_state(TreeHasher, 5, &root, |level, index| {
        Ok(nodes[&(level, index)])
    });

    assert!(matches!(result, Err(MerkleError::CorruptState { .. })));
}

#[test]
fn test_hydration_propagates_missing_node() {
    let result = CompactTree::from_state(TreeHasher, 3, &[0u8; 32], |level, index| {
        Err(MerkleError::MissingNode(alder_types::NodeId::new(
            level, index,
        )))
    });

    assert!(matches!(result, Err(MerkleError::MissingNode(_))));
}
