//! Domain-separated tree hashing (RFC 6962 §2.1).

use sha2::{Digest, Sha256};

/// Prefix byte for leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;
/// Prefix byte for interior node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// RFC 6962 tree hasher: SHA-256 with a one-byte domain prefix separating
/// leaves from interior nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeHasher;

impl TreeHasher {
    /// `SHA-256(0x00 || data)` — hash of a leaf.
    pub fn hash_leaf(&self, data: &[u8]) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update([LEAF_PREFIX]);
        h.update(data);
        h.finalize().into()
    }

    /// `SHA-256(0x01 || left || right)` — hash of an interior node.
    pub fn hash_children(&self, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
        let mut h = Sha256::new();
        h.update([NODE_PREFIX]);
        h.update(left);
        h.update(right);
        h.finalize().into()
    }

    /// `SHA-256("")` — the root of the empty tree.
    pub fn empty_root(&self) -> [u8; 32] {
        Sha256::digest([]).into()
    }
}
