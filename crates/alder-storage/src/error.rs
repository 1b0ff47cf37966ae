//! Error types for the storage crate.

use alder_types::NodeId;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Another transaction already holds the write-revision lease.
    #[error("another writer holds the revision lease")]
    WriterLeaseHeld,

    /// A requested merkle node has no row at or before the revision.
    #[error("merkle node {id} missing at revision {revision}")]
    MissingNode {
        /// Requested coordinate.
        id: NodeId,
        /// Revision ceiling of the lookup.
        revision: i64,
    },

    /// A `(node_id, revision)` row already exists.
    #[error("merkle node {id} already written at revision {revision}")]
    NodeCollision {
        /// Colliding coordinate.
        id: NodeId,
        /// Colliding revision.
        revision: i64,
    },

    /// A signed log root already exists at this revision.
    #[error("signed log root already exists at revision {0}")]
    RootRevisionExists(i64),

    /// No sequenced leaf at the requested index.
    #[error("no leaf at index {0}")]
    LeafNotFound(u64),

    /// A query parameter is outside the committed tree.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Row (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The underlying storage engine failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
