//! Error types for the sequencer crate.

use alder_merkle::MerkleError;
use alder_storage::StorageError;
use alder_types::SignError;
use alder_types::wire::WireError;

/// Errors from sequencing operations. Every error path releases the
/// storage transaction; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// The transaction's write revision does not follow the current root.
    /// Harmless: roll back and rely on the next tick.
    #[error("write revision conflict: got {got}, want {want}")]
    RevisionConflict {
        /// Revision the transaction was given.
        got: i64,
        /// `current_root.tree_revision + 1`.
        want: i64,
    },

    /// Persisted tree state failed hydration. Sequencing must stop until
    /// an operator intervenes.
    #[error("corrupt tree state: {0}")]
    CorruptState(String),

    /// Storage operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The signer refused or failed.
    #[error("signing failed: {0}")]
    Sign(#[from] SignError),

    /// Tree head serialization failed.
    #[error("wire encoding failed: {0}")]
    Wire(#[from] WireError),
}

impl From<MerkleError> for SequencerError {
    fn from(e: MerkleError) -> Self {
        Self::CorruptState(e.to_string())
    }
}
