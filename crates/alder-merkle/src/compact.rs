//! Compact Merkle tree — incremental RFC 6962 tree state.
//!
//! The tree holds one hash per set bit of `size`: the roots of the maximal
//! complete subtrees covering the leaves integrated so far (the "spine").
//! Appending a leaf merges it up the spine while the low bits of `size`
//! are set, so extending the tree by one leaf touches O(log N) nodes in
//! the worst case and O(1) amortized.

use crate::error::MerkleError;
use crate::hasher::TreeHasher;

/// In-memory incremental Merkle tree.
///
/// The spine is indexed by level (0 = leaves); level `b` is occupied iff
/// bit `b` of `size` is set. The occupied entry at level `b` is the root
/// of the complete subtree at coordinate `(b, 2 * (size >> (b + 1)))`.
pub struct CompactTree {
    hasher: TreeHasher,
    size: u64,
    spine: Vec<Option<[u8; 32]>>,
}

impl CompactTree {
    /// An empty tree.
    pub fn new(hasher: TreeHasher) -> Self {
        Self {
            hasher,
            size: 0,
            spine: Vec::new(),
        }
    }

    /// Rehydrate the tree at `size` from stored nodes.
    ///
    /// `fetch(level, index)` must return the stored hash of the subtree
    /// root at that coordinate. After fetching the whole spine the root is
    /// recomputed and compared against `root_hash`; a mismatch means the
    /// persisted state is damaged and yields [`MerkleError::CorruptState`].
    pub fn from_state<F>(
        hasher: TreeHasher,
        size: u64,
        root_hash: &[u8; 32],
        mut fetch: F,
    ) -> Result<Self, MerkleError>
    where
        F: FnMut(u8, u64) -> Result<[u8; 32], MerkleError>,
    {
        let levels = (u64::BITS - size.leading_zeros()) as usize;
        let mut spine = vec![None; levels];

        for level in 0..levels {
            if (size >> level) & 1 == 1 {
                let index = 2 * (size >> (level + 1));
                spine[level] = Some(fetch(level as u8, index)?);
            }
        }

        let tree = Self {
            hasher,
            size,
            spine,
        };

        let computed = tree.current_root();
        if computed != *root_hash {
            return Err(MerkleError::CorruptState {
                computed: hex::encode(computed),
                stored: hex::encode(root_hash),
            });
        }

        Ok(tree)
    }

    /// Number of leaves integrated so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Append a leaf hash, returning its assigned sequence number
    /// (the previous `size`).
    ///
    /// Every interior node whose hash is newly determined by this append
    /// is reported through `emit(level, index, hash)` so the caller can
    /// record the node write. The leaf node itself `(0, seq)` is not
    /// emitted; the caller already holds the leaf hash.
    pub fn append<E>(&mut self, leaf_hash: [u8; 32], mut emit: E) -> u64
    where
        E: FnMut(u8, u64, [u8; 32]),
    {
        let seq = self.size;
        let mut hash = leaf_hash;
        let mut level = 0usize;
        let mut index = seq;

        // Merge up while the current level is occupied.
        while (self.size >> level) & 1 == 1 {
            let left = self.spine[level]
                .take()
                .expect("spine level occupied when size bit is set");
            hash = self.hasher.hash_children(&left, &hash);
            index >>= 1;
            level += 1;
            emit(level as u8, index, hash);
        }

        if level == self.spine.len() {
            self.spine.push(Some(hash));
        } else {
            self.spine[level] = Some(hash);
        }

        self.size += 1;
        seq
    }

    /// Current tree root.
    ///
    /// Folds the spine from the lowest occupied level upward; lower spine
    /// entries sit to the right of higher ones, so each fold step is
    /// `hash_children(higher, accumulated)`. The empty tree hashes to
    /// `SHA-256("")`.
    pub fn current_root(&self) -> [u8; 32] {
        let mut root: Option<[u8; 32]> = None;

        for entry in &self.spine {
            if let Some(hash) = entry {
                root = Some(match root {
                    None => *hash,
                    Some(right) => self.hasher.hash_children(hash, &right),
                });
            }
        }

        root.unwrap_or_else(|| self.hasher.empty_root())
    }
}
