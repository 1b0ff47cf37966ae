//! Storage traits for the alder log.
//!
//! [`LogStorage`] hands out read snapshots and single-writer transactions.
//! A [`LogTransaction`] owns a **write revision** fixed at `begin()`; all
//! writes are staged and become visible atomically at `commit()`. Dropping
//! an uncommitted transaction discards the staged writes and releases the
//! revision lease, so every early-return path in a caller rolls back.

use alder_types::{Leaf, Node, NodeId, Proof, SignedLogRoot};

use crate::error::StorageError;

/// A log storage backend.
///
/// Implementations must be `Send + Sync`; readers may run concurrently
/// with each other and with the single writer.
pub trait LogStorage: Send + Sync {
    /// Open a write transaction holding the revision lease.
    ///
    /// Fails with [`StorageError::WriterLeaseHeld`] while another
    /// transaction is open.
    fn begin(&self) -> Result<Box<dyn LogTransaction + '_>, StorageError>;

    /// Open a read-only view of committed state.
    fn snapshot(&self) -> Result<Box<dyn LogReader + '_>, StorageError>;

    /// Append leaves to the pending queue.
    ///
    /// A leaf whose `leaf_hash` is already queued or sequenced is dropped
    /// (duplicate suppression). Returns the number actually queued.
    fn queue_leaves(&self, leaves: &[Leaf]) -> Result<usize, StorageError>;

    /// Number of leaves waiting to be sequenced.
    fn pending_count(&self) -> Result<usize, StorageError>;
}

/// Read operations, available on snapshots and inside transactions.
pub trait LogReader {
    /// The most recent signed log root, or the zero-valued root for a
    /// log that has never signed one.
    fn latest_signed_log_root(&self) -> Result<SignedLogRoot, StorageError>;

    /// Sequenced leaves by index. The result order and count follow the
    /// stored rows; callers validate against what they asked for.
    fn get_leaves_by_index(&self, indices: &[u64]) -> Result<Vec<Leaf>, StorageError>;

    /// RFC 6962 audit paths for every sequenced occurrence of `leaf_hash`
    /// in the tree of `tree_size`. Empty when the hash is not present.
    fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
        order_by_sequence: bool,
    ) -> Result<Vec<Proof>, StorageError>;

    /// RFC 6962 consistency proof between tree sizes `first` and `second`.
    fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Proof, StorageError>;

    /// A leaf plus its audit path in the tree of `tree_size`.
    fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), StorageError>;
}

/// A single-writer transaction at a fixed write revision.
pub trait LogTransaction: LogReader {
    /// The revision this transaction writes at, fixed at `begin()`.
    fn write_revision(&self) -> i64;

    /// Take up to `limit` leaves from the head of the pending queue.
    ///
    /// The returned leaves still carry `sequence_number == -1`. They are
    /// removed from the queue only at `commit()`; a rollback leaves the
    /// queue untouched. Order is the deterministic queue order.
    fn dequeue_leaves(&mut self, limit: usize) -> Result<Vec<Leaf>, StorageError>;

    /// Record sequence numbers for dequeued leaves (identified by
    /// `leaf_hash`). All leaves must carry an assigned sequence number.
    fn update_sequenced_leaves(&mut self, leaves: &[Leaf]) -> Result<(), StorageError>;

    /// Fetch the most recent row at or before `revision` for each id.
    ///
    /// Returns exactly one node per requested id or fails with
    /// [`StorageError::MissingNode`].
    fn get_merkle_nodes(
        &self,
        revision: i64,
        ids: &[NodeId],
    ) -> Result<Vec<Node>, StorageError>;

    /// Stage node rows at this transaction's write revision.
    ///
    /// Fails with [`StorageError::NodeCollision`] if a `(node_id,
    /// revision)` row already exists.
    fn set_merkle_nodes(&mut self, nodes: &[Node]) -> Result<(), StorageError>;

    /// Stage a new signed log root. Fails with
    /// [`StorageError::RootRevisionExists`] on a duplicate revision.
    fn store_signed_log_root(&mut self, root: &SignedLogRoot) -> Result<(), StorageError>;

    /// Atomically apply all staged writes and release the lease.
    fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Discard all staged writes and release the lease. Dropping the
    /// transaction has the same effect; this form makes the intent
    /// explicit on error paths.
    fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
