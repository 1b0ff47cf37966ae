//! Error types for the merkle crate.

use alder_types::NodeId;

/// Errors from compact tree hydration.
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    /// Folding the fetched spine did not reproduce the stored root hash.
    /// The persisted tree state is damaged; sequencing must stop.
    #[error("hydrated root {computed} does not match stored root {stored}")]
    CorruptState {
        /// Root recomputed from the fetched spine (hex).
        computed: String,
        /// Root recorded in the signed log root (hex).
        stored: String,
    },

    /// Storage did not return a required spine node.
    #[error("missing merkle node {0}")]
    MissingNode(NodeId),

    /// Node fetch failed in the storage layer.
    #[error("node fetch failed: {0}")]
    Fetch(String),
}
