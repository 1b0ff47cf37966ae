//! Log backend client abstraction.
//!
//! Handlers talk to the log through [`LogBackend`] so tests can script
//! responses (including structurally impossible ones). The production
//! implementation, [`StorageBackend`], serves every call from a committed
//! snapshot of the storage layer.

use std::sync::Arc;

use alder_storage::{LogReader as _, LogStorage};
use alder_types::{Leaf, Proof, SignedLogRoot};
use async_trait::async_trait;

/// Errors from the backend boundary.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The call failed or the backend reported a non-OK status.
    #[error("{0}")]
    Unavailable(String),
}

/// The log backend surface the front-end depends on.
#[async_trait]
pub trait LogBackend: Send + Sync {
    /// Queue leaves for integration.
    async fn queue_leaves(&self, leaves: Vec<Leaf>) -> Result<(), BackendError>;

    /// The current signed tree head.
    async fn latest_signed_log_root(&self) -> Result<SignedLogRoot, BackendError>;

    /// Audit paths for a leaf hash; one per duplicate occurrence.
    async fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: Vec<u8>,
        tree_size: u64,
    ) -> Result<Vec<Proof>, BackendError>;

    /// Consistency proof between two tree sizes.
    async fn get_consistency_proof(
        &self,
        first: u64,
        second: u64,
    ) -> Result<Proof, BackendError>;

    /// A leaf with its audit path.
    async fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), BackendError>;

    /// Sequenced leaves by index.
    async fn get_leaves_by_index(&self, indices: Vec<u64>) -> Result<Vec<Leaf>, BackendError>;
}

/// Embedded backend serving requests from [`LogStorage`] snapshots.
pub struct StorageBackend {
    storage: Arc<dyn LogStorage>,
}

impl StorageBackend {
    /// Wrap a storage handle.
    pub fn new(storage: Arc<dyn LogStorage>) -> Self {
        Self { storage }
    }

    fn unavailable(e: impl std::fmt::Display) -> BackendError {
        BackendError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl LogBackend for StorageBackend {
    async fn queue_leaves(&self, leaves: Vec<Leaf>) -> Result<(), BackendError> {
        self.storage
            .queue_leaves(&leaves)
            .map_err(Self::unavailable)?;
        Ok(())
    }

    async fn latest_signed_log_root(&self) -> Result<SignedLogRoot, BackendError> {
        self.storage
            .snapshot()
            .map_err(Self::unavailable)?
            .latest_signed_log_root()
            .map_err(Self::unavailable)
    }

    async fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: Vec<u8>,
        tree_size: u64,
    ) -> Result<Vec<Proof>, BackendError> {
        // A hash of the wrong width cannot match any stored leaf.
        let Ok(hash) = <[u8; 32]>::try_from(leaf_hash.as_slice()) else {
            return Ok(Vec::new());
        };
        self.storage
            .snapshot()
            .map_err(Self::unavailable)?
            .get_inclusion_proof_by_hash(&hash, tree_size, true)
            .map_err(Self::unavailable)
    }

    async fn get_consistency_proof(
        &self,
        first: u64,
        second: u64,
    ) -> Result<Proof, BackendError> {
        self.storage
            .snapshot()
            .map_err(Self::unavailable)?
            .get_consistency_proof(first, second)
            .map_err(Self::unavailable)
    }

    async fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), BackendError> {
        self.storage
            .snapshot()
            .map_err(Self::unavailable)?
            .get_entry_and_proof(leaf_index, tree_size)
            .map_err(Self::unavailable)
    }

    async fn get_leaves_by_index(&self, indices: Vec<u64>) -> Result<Vec<Leaf>, BackendError> {
        self.storage
            .snapshot()
            .map_err(Self::unavailable)?
            .get_leaves_by_index(&indices)
            .map_err(Self::unavailable)
    }
}
