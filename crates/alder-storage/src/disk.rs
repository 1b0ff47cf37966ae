//! Fjall-backed persistent storage.
//!
//! Rows live in six keyspaces:
//!
//! | keyspace | key | value |
//! |---|---|---|
//! | `queue` | big-endian arrival counter | postcard [`Leaf`] |
//! | `queued` | leaf hash | empty (duplicate suppression) |
//! | `leaves` | big-endian sequence number | postcard [`Leaf`] |
//! | `leaf_index` | leaf hash ++ big-endian sequence | empty |
//! | `nodes` | node id (9 bytes) ++ big-endian revision | 32-byte hash |
//! | `roots` | big-endian revision | postcard [`SignedLogRoot`] |
//!
//! plus a `meta` keyspace carrying the latest root revision. A transaction
//! stages all writes in memory and applies them under the writer lease at
//! commit; dropping the transaction discards the staging buffers.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use alder_types::{Leaf, Node, NodeId, Proof, SignedLogRoot};
use fjall::{Database, Keyspace, KeyspaceCreateOptions};
use tracing::debug;

use crate::error::StorageError;
use crate::queries;
use crate::traits::{LogReader, LogStorage, LogTransaction};

const META_LATEST_ROOT: &[u8] = b"latest_root_revision";

fn backend_err(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Fjall-backed [`LogStorage`] implementation.
pub struct FjallLogStorage {
    log_id: i64,
    #[allow(dead_code)]
    db: Database,
    queue: Keyspace,
    queued: Keyspace,
    leaves: Keyspace,
    leaf_index: Keyspace,
    nodes: Keyspace,
    roots: Keyspace,
    meta: Keyspace,
    /// Next queue arrival counter.
    queue_tail: AtomicU64,
    write_lease: Mutex<()>,
    /// Guards the temporary directory of [`FjallLogStorage::open_temporary`].
    _tmp: Option<tempfile::TempDir>,
}

impl FjallLogStorage {
    /// Open (or create) a persistent store at `path`.
    pub fn open(path: impl AsRef<Path>, log_id: i64) -> Result<Self, StorageError> {
        let db = Database::builder(path).open().map_err(backend_err)?;
        Self::init(db, log_id, None)
    }

    /// Open a store in a temporary directory (removed on drop).
    pub fn open_temporary(log_id: i64) -> Result<Self, StorageError> {
        let tmp = tempfile::tempdir().map_err(backend_err)?;
        let db = Database::builder(tmp.path())
            .temporary(true)
            .open()
            .map_err(backend_err)?;
        Self::init(db, log_id, Some(tmp))
    }

    fn init(
        db: Database,
        log_id: i64,
        tmp: Option<tempfile::TempDir>,
    ) -> Result<Self, StorageError> {
        let keyspace = |name: &str| {
            db.keyspace(name, KeyspaceCreateOptions::default)
                .map_err(backend_err)
        };
        let queue = keyspace("queue")?;
        let queued = keyspace("queued")?;
        let leaves = keyspace("leaves")?;
        let leaf_index = keyspace("leaf_index")?;
        let nodes = keyspace("nodes")?;
        let roots = keyspace("roots")?;
        let meta = keyspace("meta")?;

        // Resume the arrival counter after the last queued entry.
        let mut tail = 0u64;
        for guard in queue.iter() {
            let key = guard.key().map_err(backend_err)?;
            if let Ok(arr) = <[u8; 8]>::try_from(&key[..]) {
                tail = tail.max(u64::from_be_bytes(arr) + 1);
            }
        }

        Ok(Self {
            log_id,
            db,
            queue,
            queued,
            leaves,
            leaf_index,
            nodes,
            roots,
            meta,
            queue_tail: AtomicU64::new(tail),
            write_lease: Mutex::new(()),
            _tmp: tmp,
        })
    }

    fn latest_root(&self) -> Result<SignedLogRoot, StorageError> {
        let Some(rev_bytes) = self.meta.get(META_LATEST_ROOT).map_err(backend_err)? else {
            return Ok(SignedLogRoot::zero(self.log_id));
        };
        let Some(root_bytes) = self.roots.get(&rev_bytes[..]).map_err(backend_err)? else {
            return Err(StorageError::Backend(
                "meta points at a missing signed log root".to_string(),
            ));
        };
        Ok(postcard::from_bytes(&root_bytes)?)
    }

    fn leaf_by_seq(&self, seq: u64) -> Result<Option<Leaf>, StorageError> {
        match self.leaves.get(seq.to_be_bytes()).map_err(backend_err)? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Dense leaf-hash layer for the tree of `tree_size`.
    fn leaf_hashes(&self, tree_size: u64) -> Result<Vec<[u8; 32]>, StorageError> {
        let mut hashes = Vec::with_capacity(tree_size as usize);
        for guard in self.leaves.iter().take(tree_size as usize) {
            let (_, value) = guard.into_inner().map_err(backend_err)?;
            let leaf: Leaf = postcard::from_bytes(&value)?;
            hashes.push(leaf.leaf_hash);
        }
        if hashes.len() as u64 != tree_size {
            return Err(StorageError::Backend(format!(
                "leaf layer has {} rows, expected {tree_size}",
                hashes.len()
            )));
        }
        Ok(hashes)
    }

    fn node_at_or_before(&self, id: NodeId, revision: i64) -> Result<Option<Node>, StorageError> {
        let mut best: Option<(i64, [u8; 32])> = None;
        for guard in self.nodes.prefix(id.to_bytes()) {
            let (key, value) = guard.into_inner().map_err(backend_err)?;
            let Ok(rev_arr) = <[u8; 8]>::try_from(&key[9..]) else {
                continue;
            };
            let rev = i64::from_be_bytes(rev_arr);
            if rev <= revision && best.is_none_or(|(b, _)| rev > b) {
                let Ok(hash) = <[u8; 32]>::try_from(&value[..]) else {
                    return Err(StorageError::Backend(format!(
                        "node {id} row has a malformed hash"
                    )));
                };
                best = Some((rev, hash));
            }
        }
        Ok(best.map(|(rev, hash)| Node {
            id,
            hash,
            revision: rev,
        }))
    }
}

impl LogStorage for FjallLogStorage {
    fn begin(&self) -> Result<Box<dyn LogTransaction + '_>, StorageError> {
        let lease = self
            .write_lease
            .try_lock()
            .map_err(|_| StorageError::WriterLeaseHeld)?;
        let write_revision = self.latest_root()?.tree_revision + 1;

        Ok(Box::new(FjallTransaction {
            store: self,
            _lease: lease,
            write_revision,
            dequeued_keys: Vec::new(),
            staged_sequenced: Vec::new(),
            staged_nodes: Vec::new(),
            staged_root: None,
        }))
    }

    fn snapshot(&self) -> Result<Box<dyn LogReader + '_>, StorageError> {
        Ok(Box::new(FjallReader { store: self }))
    }

    fn queue_leaves(&self, leaves: &[Leaf]) -> Result<usize, StorageError> {
        let mut queued = 0;
        for leaf in leaves {
            let seen_queued = self
                .queued
                .get(leaf.leaf_hash)
                .map_err(backend_err)?
                .is_some();
            let seen_sequenced = self.leaf_index.prefix(leaf.leaf_hash).next().is_some();
            if seen_queued || seen_sequenced {
                debug!("dropping duplicate leaf");
                continue;
            }

            let key = self.queue_tail.fetch_add(1, Ordering::SeqCst);
            let bytes = postcard::to_allocvec(leaf)?;
            self.queue
                .insert(key.to_be_bytes(), bytes)
                .map_err(backend_err)?;
            self.queued
                .insert(leaf.leaf_hash, [])
                .map_err(backend_err)?;
            queued += 1;
        }
        Ok(queued)
    }

    fn pending_count(&self) -> Result<usize, StorageError> {
        let mut count = 0;
        for guard in self.queue.iter() {
            guard.key().map_err(backend_err)?;
            count += 1;
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Snapshot reader
// ---------------------------------------------------------------------------

struct FjallReader<'a> {
    store: &'a FjallLogStorage,
}

impl LogReader for FjallReader<'_> {
    fn latest_signed_log_root(&self) -> Result<SignedLogRoot, StorageError> {
        self.store.latest_root()
    }

    fn get_leaves_by_index(&self, indices: &[u64]) -> Result<Vec<Leaf>, StorageError> {
        indices
            .iter()
            .map(|&i| {
                self.store
                    .leaf_by_seq(i)?
                    .ok_or(StorageError::LeafNotFound(i))
            })
            .collect()
    }

    fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
        _order_by_sequence: bool,
    ) -> Result<Vec<Proof>, StorageError> {
        queries::check_tree_size(tree_size, self.store.latest_root()?.tree_size)?;
        let hashes = self.store.leaf_hashes(tree_size)?;
        queries::inclusion_proofs_by_hash(&hashes, leaf_hash)
    }

    fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Proof, StorageError> {
        queries::check_tree_size(second, self.store.latest_root()?.tree_size)?;
        let hashes = self.store.leaf_hashes(second)?;
        queries::consistency_proof(&hashes, first)
    }

    fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), StorageError> {
        queries::check_tree_size(tree_size, self.store.latest_root()?.tree_size)?;
        let leaf = self
            .store
            .leaf_by_seq(leaf_index)?
            .ok_or(StorageError::LeafNotFound(leaf_index))?;
        let hashes = self.store.leaf_hashes(tree_size)?;
        let proof = queries::inclusion_proof_by_index(&hashes, leaf_index)?;
        Ok((leaf, proof))
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

struct FjallTransaction<'a> {
    store: &'a FjallLogStorage,
    _lease: MutexGuard<'a, ()>,
    write_revision: i64,
    /// Queue keys (and hashes) handed out so far, deleted at commit.
    dequeued_keys: Vec<(Vec<u8>, [u8; 32])>,
    staged_sequenced: Vec<Leaf>,
    staged_nodes: Vec<Node>,
    staged_root: Option<SignedLogRoot>,
}

impl LogReader for FjallTransaction<'_> {
    fn latest_signed_log_root(&self) -> Result<SignedLogRoot, StorageError> {
        self.store.latest_root()
    }

    fn get_leaves_by_index(&self, indices: &[u64]) -> Result<Vec<Leaf>, StorageError> {
        FjallReader { store: self.store }.get_leaves_by_index(indices)
    }

    fn get_inclusion_proof_by_hash(
        &self,
        leaf_hash: &[u8; 32],
        tree_size: u64,
        order_by_sequence: bool,
    ) -> Result<Vec<Proof>, StorageError> {
        FjallReader { store: self.store }.get_inclusion_proof_by_hash(
            leaf_hash,
            tree_size,
            order_by_sequence,
        )
    }

    fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Proof, StorageError> {
        FjallReader { store: self.store }.get_consistency_proof(first, second)
    }

    fn get_entry_and_proof(
        &self,
        leaf_index: u64,
        tree_size: u64,
    ) -> Result<(Leaf, Proof), StorageError> {
        FjallReader { store: self.store }.get_entry_and_proof(leaf_index, tree_size)
    }
}

impl LogTransaction for FjallTransaction<'_> {
    fn write_revision(&self) -> i64 {
        self.write_revision
    }

    fn dequeue_leaves(&mut self, limit: usize) -> Result<Vec<Leaf>, StorageError> {
        let offset = self.dequeued_keys.len();
        let mut out = Vec::new();
        for guard in self.store.queue.iter().skip(offset).take(limit) {
            let (key, value) = guard.into_inner().map_err(backend_err)?;
            let leaf: Leaf = postcard::from_bytes(&value)?;
            self.dequeued_keys.push((key.to_vec(), leaf.leaf_hash));
            out.push(leaf);
        }
        Ok(out)
    }

    fn update_sequenced_leaves(&mut self, leaves: &[Leaf]) -> Result<(), StorageError> {
        for leaf in leaves {
            if leaf.sequence_number < 0 {
                return Err(StorageError::InvalidArgument(
                    "leaf has no sequence number".to_string(),
                ));
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
        ids.iter()
            .map(|&id| {
                self.store
                    .node_at_or_before(id, revision)?
                    .ok_or(StorageError::MissingNode { id, revision })
            })
            .collect()
    }

    fn set_merkle_nodes(&mut self, nodes: &[Node]) -> Result<(), StorageError> {
        for node in nodes {
            let mut key = Vec::with_capacity(17);
            key.extend_from_slice(&node.id.to_bytes());
            key.extend_from_slice(&node.revision.to_be_bytes());
            let committed = self.store.nodes.get(&key).map_err(backend_err)?.is_some();
            let staged = self
                .staged_nodes
                .iter()
                .any(|n| n.id == node.id && n.revision == node.revision);
            if committed || staged {
                return Err(StorageError::NodeCollision {
                    id: node.id,
                    revision: node.revision,
                });
            }
        }
        self.staged_nodes.extend_from_slice(nodes);
        Ok(())
    }

    fn store_signed_log_root(&mut self, root: &SignedLogRoot) -> Result<(), StorageError> {
        let key = root.tree_revision.to_be_bytes();
        let committed = self.store.roots.get(key).map_err(backend_err)?.is_some();
        let staged = self
            .staged_root
            .as_ref()
            .is_some_and(|r| r.tree_revision == root.tree_revision);
        if committed || staged {
            return Err(StorageError::RootRevisionExists(root.tree_revision));
        }
        self.staged_root = Some(root.clone());
        Ok(())
    }

    fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let store = self.store;

        for (key, leaf_hash) in &self.dequeued_keys {
            store.queue.remove(&key[..]).map_err(backend_err)?;
            store.queued.remove(leaf_hash).map_err(backend_err)?;
        }

        for leaf in &self.staged_sequenced {
            let seq = leaf.sequence_number as u64;
            let bytes = postcard::to_allocvec(leaf)?;
            store
                .leaves
                .insert(seq.to_be_bytes(), bytes)
                .map_err(backend_err)?;

            let mut index_key = Vec::with_capacity(40);
            index_key.extend_from_slice(&leaf.leaf_hash);
            index_key.extend_from_slice(&seq.to_be_bytes());
            store
                .leaf_index
                .insert(index_key, [])
                .map_err(backend_err)?;
        }

        for node in &self.staged_nodes {
            let mut key = Vec::with_capacity(17);
            key.extend_from_slice(&node.id.to_bytes());
            key.extend_from_slice(&node.revision.to_be_bytes());
            store.nodes.insert(key, node.hash).map_err(backend_err)?;
        }

        if let Some(root) = &self.staged_root {
            let key = root.tree_revision.to_be_bytes();
            let bytes = postcard::to_allocvec(root)?;
            store.roots.insert(key, bytes).map_err(backend_err)?;
            store
                .meta
                .insert(META_LATEST_ROOT, key)
                .map_err(backend_err)?;
        }

        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
