//! In-memory storage backend.
//!
//! Backs tests and `--memory` daemon mode. All committed state lives in a
//! `RwLock`'d struct; a transaction stages its writes privately and
//! applies them under the write lock at commit, so an aborted transaction
//! leaves committed state untouched.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, RwLock};

use alder_types::{Leaf, Node, NodeId, Proof, SignedLogRoot};
use tracing::debug;

use crate::error::StorageError;
use crate::queries;
use crate::traits::{LogReader, LogStorage, LogTransaction};

#[derive(Default)]
struct MemoryInner {
    /// Pending leaves, FIFO.
    queue: VecDeque<Leaf>,
    /// Hashes currently in the queue (duplicate suppression).
    queued_hashes: HashSet<[u8; 32]>,
    /// Sequenced leaves, dense from 0.
    sequenced: Vec<Leaf>,
    /// leaf_hash → sequence numbers (ascending).
    by_hash: HashMap<[u8; 32], Vec<u64>>,
    /// node id → revision → hash.
    nodes: HashMap<NodeId, Vec<(i64, [u8; 32])>>,
    /// revision → signed log root (ascending revisions).
    roots: Vec<SignedLogRoot>,
}

impl MemoryInner {
    fn latest_root(&self, log_id: i64) -> SignedLogRoot {
        self.roots
            .last()
            .cloned()
            .unwrap_or_else(|| SignedLogRoot::zero(log_id))
    }

    fn leaf_hashes(&self, tree_size: u64) -> Vec<[u8; 32]> {
        self.sequenced[..tree_size as usize]
            .iter()
            .map(|l| l.leaf_hash)
            .collect()
    }

    fn node_at_or_before(&self, id: NodeId, revision: i64) -> Option<Node> {
        let rows = self.nodes.get(&id)?;
        rows.iter()
            .rev()
            .find(|(rev, _)| *rev <= revision)
            .map(|(rev, hash)| Node {
                id,
                hash: *hash,
                revision: *rev,
            })
    }
}

/// In-memory [`LogStorage`] implementation.
pub struct MemoryLogStorage {
    log_id: i64,
    inner: RwLock<MemoryInner>,
    write_lease: Mutex<()>,
}

impl MemoryLogStorage {
    /// Create an empty in-memory log store.
    pub fn new(log_id: i64) -> Self {
        Self {
            log_id,
            inner: RwLock::new(MemoryInner::default()),
            write_lease: Mutex::new(()),
        }
    }
}

impl LogStorage for MemoryLogStorage {
    fn begin(&self) -> Result<Box<dyn LogTransaction + '_>, StorageError> {
        let lease = self
            .write_lease
            .try_lock()
            .map_err(|_| StorageError::WriterLeaseHeld)?;

        let write_revision = {
            let inner = self.inner.read().expect("storage lock poisoned");
            inner.latest_root(self.log_id).tree_revision + 1
        };

        Ok(Box::new(MemoryTransaction {
            store: self,
            _lease: lease,
            write_revision,
            dequeued: 0,
            staged_sequenced: Vec::new(),
            staged_nodes: Vec::new(),
            staged_root: None,
        }))
    }

    fn snapshot(&self) -> Result<Box<dyn LogReader + '_>, StorageError> {
        Ok(Box::new(MemoryReader { store: self }))
    }

    fn queue_leaves(&self, leaves: &[Leaf]) -> Result<usize, StorageError> {
        let mut inner = self.inner.write().expect("storage lock poisoned");
        let mut queued = 0;

        for leaf in leaves {
            if inner.queued_hashes.contains(&leaf.leaf_hash)
                || inner.by_hash.contains_key(&leaf.leaf_hash)
            {
                debug!(leaf_hash = %hex_prefix(&leaf.leaf_hash), "dropping duplicate leaf");
                continue;
            }
            inner.queued_hashes.insert(leaf.leaf_hash);
            inner.queue.push_back(leaf.clone());
            queued += 1;
        }

        Ok(queued)
    }

    fn pending_count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.read().expect("storage lock poisoned").queue.len())
    }
}

fn hex_prefix(hash: &[u8; 32]) -> String {
    hash[..4].iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Shared read logic
// ---------------------------------------------------------------------------

fn read_leaves_by_index(
    inner: &MemoryInner,
    indices: &[u64],
) -> Result<Vec<Leaf>, StorageError> {
    indices
        .iter()
        .map(|&i| {
            inner
                .sequenced
                .get(i as usize)
                .cloned()
                .ok_or(StorageError::LeafNotFound(i))
        })
        .collect()
}

fn read_inclusion_by_hash(
    inner: &MemoryInner,
    log_id: i64,
    leaf_hash: &[u8; 32],
    tree_size: u64,
) -> Result<Vec<Proof>, StorageError> {
    queries::check_tree_size(tree_size, inner.latest_root(log_id).tree_size)?;
    let hashes = inner.leaf_hashes(tree_size);
    queries::inclusion_proofs_by_hash(&hashes, leaf_hash)
}

fn read_consistency(
    inner: &MemoryInner,
    log_id: i64,
    first: u64,
    second: u64,
) -> Result<Proof, StorageError> {
    queries::check_tree_size(second, inner.latest_root(log_id).tree_size)?;
    let hashes = inner.leaf_hashes(second);
    queries::consistency_proof(&hashes, first)
}

fn read_entry_and_proof(
    inner: &MemoryInner,
    log_id: i64,
    leaf_index: u64,
    tree_size: u64,
) -> Result<(Leaf, Proof), StorageError> {
    queries::check_tree_size(tree_size, inner.latest_root(log_id).tree_size)?;
    let leaf = inner
        .sequenced
        .get(leaf_index as usize)
        .cloned()
        .ok_or(StorageError::LeafNotFound(leaf_index))?;
    let hashes = inner.leaf_hashes(tree_size);
    let proof = queries::inclusion_proof_by_index(&hashes, leaf_index)?;
    Ok((leaf, proof))
}

// ---------------------------------------------------------------------------
// Snapshot reader
// ---------------------------------------------------------------------------

struct MemoryReader<'a> {
    store: &'a MemoryLogStorage,
}

impl MemoryReader<'_> {
    fn with_inner<T>(
        &self,
        f: impl FnOnce(&MemoryInner) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        f(&inner)
    }
}

impl LogReader for MemoryReader<'_> {
    fn latest_signed_log_root(&self) -> Result<SignedLogRoot, StorageError> {
        self.with_inner(|inner| Ok(inner.latest_root(self.store.log_id)))
    }

    fn get_leaves_by_index(&self, indices: &[u64]) -> Result<Vec<Leaf>, StorageError> {
        self.with_inner(|inner| read_leaves_by_index(inner, indices))
    }

    fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
        _order_by_sequence: bool,
    ) -> Result<Vec<Proof>, StorageError> {
        self.with_inner(|inner| {
            read_inclusion_by_hash(inner, self.store.log_id, leaf_hash, tree_size)
        })
    }

    fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Proof, StorageError> {
        self.with_inner(|inner| read_consistency(inner, self.store.log_id, first, second))
    }

    fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), StorageError> {
        self.with_inner(|inner| {
            read_entry_and_proof(inner, self.store.log_id, leaf_index, tree_size)
        })
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

struct MemoryTransaction<'a> {
    store: &'a MemoryLogStorage,
    _lease: MutexGuard<'a, ()>,
    write_revision: i64,
    /// Leaves handed out by `dequeue_leaves`, popped from the queue head
    /// at commit.
    dequeued: usize,
    staged_sequenced: Vec<Leaf>,
    staged_nodes: Vec<Node>,
    staged_root: Option<SignedLogRoot>,
}

impl MemoryTransaction<'_> {
    fn with_inner<T>(
        &self,
        f: impl FnOnce(&MemoryInner) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        f(&inner)
    }
}

impl LogReader for MemoryTransaction<'_> {
    fn latest_signed_log_root(&self) -> Result<SignedLogRoot, StorageError> {
        self.with_inner(|inner| Ok(inner.latest_root(self.store.log_id)))
    }

    fn get_leaves_by_index(&self, indices: &[u64]) -> Result<Vec<Leaf>, StorageError> {
        self.with_inner(|inner| read_leaves_by_index(inner, indices))
    }

    fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
        _order_by_sequence: bool,
    ) -> Result<Vec<Proof>, StorageError> {
        self.with_inner(|inner| {
            read_inclusion_by_hash(inner, self.store.log_id, leaf_hash, tree_size)
        })
    }

    fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Proof, StorageError> {
        self.with_inner(|inner| read_consistency(inner, self.store.log_id, first, second))
    }

    fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), StorageError> {
        self.with_inner(|inner| {
            read_entry_and_proof(inner, self.store.log_id, leaf_index, tree_size)
        })
    }
}

impl LogTransaction for MemoryTransaction<'_> {
    fn write_revision(&self) -> i64 {
        self.write_revision
    }

    fn dequeue_leaves(&mut self, limit: usize) -> Result<Vec<Leaf>, StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        let leaves: Vec<Leaf> = inner
            .queue
            .iter()
            .skip(self.dequeued)
            .take(limit)
            .cloned()
            .collect();
        self.dequeued += leaves.len();
        Ok(leaves)
    }

    fn update_sequenced_leaves(&mut self, leaves: &[Leaf]) -> Result<(), StorageError> {
        for leaf in leaves {
            if leaf.sequence_number < 0 {
                return Err(StorageError::InvalidArgument(format!(
                    "leaf {} has no sequence number",
                    hex_prefix(&leaf.leaf_hash)
                )));
            }
        }
        self.staged_sequenced.extend_from_slice(leaves);
        Ok(())
    }

    fn get_merkle_nodes(
        &self,
        revision: i64,
        ids: &[NodeId],
    ) -> Result<Vec<Node>, StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        ids.iter()
            .map(|&id| {
                inner
                    .node_at_or_before(id, revision)
                    .ok_or(StorageError::MissingNode { id, revision })
            })
            .collect()
    }

    fn set_merkle_nodes(&mut self, nodes: &[Node]) -> Result<(), StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        for node in nodes {
            let committed_collision = inner
                .nodes
                .get(&node.id)
                .is_some_and(|rows| rows.iter().any(|(rev, _)| *rev == node.revision));
            let staged_collision = self
                .staged_nodes
                .iter()
                .any(|n| n.id == node.id && n.revision == node.revision);
            if committed_collision || staged_collision {
                return Err(StorageError::NodeCollision {
                    id: node.id,
                    revision: node.revision,
                });
            }
        }
        drop(inner);
        self.staged_nodes.extend_from_slice(nodes);
        Ok(())
    }

    fn store_signed_log_root(&mut self, root: &SignedLogRoot) -> Result<(), StorageError> {
        let inner = self.store.inner.read().expect("storage lock poisoned");
        let exists = inner
            .roots
            .iter()
            .any(|r| r.tree_revision == root.tree_revision)
            || self
                .staged_root
                .as_ref()
                .is_some_and(|r| r.tree_revision == root.tree_revision);
        if exists {
            return Err(StorageError::RootRevisionExists(root.tree_revision));
        }
        drop(inner);
        self.staged_root = Some(root.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut inner = self.store.inner.write().expect("storage lock poisoned");

        for _ in 0..self.dequeued {
            if let Some(leaf) = inner.queue.pop_front() {
                inner.queued_hashes.remove(&leaf.leaf_hash);
            }
        }

        let mut sequenced = self.staged_sequenced;
        sequenced.sort_by_key(|l| l.sequence_number);
        for leaf in sequenced {
            let seq = leaf.sequence_number as u64;
            debug_assert_eq!(
                seq as usize,
                inner.sequenced.len(),
                "sequence numbers must stay dense"
            );
            inner.by_hash.entry(leaf.leaf_hash).or_default().push(seq);
            inner.sequenced.push(leaf);
        }

        for node in self.staged_nodes {
            inner
                .nodes
                .entry(node.id)
                .or_default()
                .push((node.revision, node.hash));
        }

        if let Some(root) = self.staged_root {
            inner.roots.push(root);
        }

        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        // Staged writes are dropped with the transaction; the lease is
        // released when the guard drops.
        Ok(())
    }
}
