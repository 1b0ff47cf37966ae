//! Proof queries shared by the storage backends.
//!
//! Both backends answer proof queries the same way: fetch the dense
//! leaf-hash layer up to the requested tree size and apply the RFC 6962
//! reference path algorithms. Interior node rows exist for compact-tree
//! hydration and revision history; proofs are derived from the leaf layer
//! so every served path is the canonical one by construction.

use alder_merkle::TreeHasher;
use alder_merkle::proof::{consistency_path, inclusion_path};
use alder_types::Proof;

use crate::error::StorageError;

fn to_proof(leaf_index: i64, path: Vec<[u8; 32]>) -> Proof {
    Proof {
        leaf_index,
        hashes: path.into_iter().map(|h| h.to_vec()).collect(),
    }
}

/// Audit paths for every occurrence of `leaf_hash` among `hashes`
/// (the leaf layer of the tree of size `hashes.len()`), in sequence order.
pub(crate) fn inclusion_proofs_by_hash(
    hashes: &[[u8; 32]],
    leaf_hash: &[u8; 32],
) -> Result<Vec<Proof>, StorageError> {
    let hasher = TreeHasher;
    let mut proofs = Vec::new();

    for (index, candidate) in hashes.iter().enumerate() {
        if candidate == leaf_hash {
            let path = inclusion_path(&hasher, index as u64, hashes).ok_or_else(|| {
                StorageError::InvalidArgument(format!("leaf index {index} outside tree"))
            })?;
            proofs.push(to_proof(index as i64, path));
        }
    }

    Ok(proofs)
}

/// Audit path for the leaf at `leaf_index` in the tree over `hashes`.
pub(crate) fn inclusion_proof_by_index(
    hashes: &[[u8; 32]],
    leaf_index: u64,
) -> Result<Proof, StorageError> {
    let path = inclusion_path(&TreeHasher, leaf_index, hashes).ok_or_else(|| {
        StorageError::InvalidArgument(format!(
            "leaf index {leaf_index} outside tree of size {}",
            hashes.len()
        ))
    })?;
    Ok(to_proof(leaf_index as i64, path))
}

/// Consistency proof from tree size `first` to the tree over `hashes`.
pub(crate) fn consistency_proof(
    hashes: &[[u8; 32]],
    first: u64,
) -> Result<Proof, StorageError> {
    let path = consistency_path(&TreeHasher, first, hashes).ok_or_else(|| {
        StorageError::InvalidArgument(format!(
            "first size {first} outside tree of size {}",
            hashes.len()
        ))
    })?;
    Ok(to_proof(0, path))
}

/// Validate a proof query's tree size against the committed tree size.
pub(crate) fn check_tree_size(requested: u64, committed: i64) -> Result<(), StorageError> {
    let committed = committed.max(0) as u64;
    if requested == 0 || requested > committed {
        return Err(StorageError::InvalidArgument(format!(
            "tree size {requested} outside committed size {committed}"
        )));
    }
    Ok(())
}
