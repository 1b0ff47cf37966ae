//! The batch integration state machine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alder_merkle::{CompactTree, MerkleError, TreeHasher};
use alder_storage::{LogStorage, LogTransaction};
use alder_types::wire::tree_head_signature_payload;
use alder_types::{Node, NodeId, Signer, SignedLogRoot, TimeSource};
use tracing::{info, warn};

use crate::error::SequencerError;

/// Integrates queued leaves into the Merkle tree and signs tree heads.
///
/// One sequencer instance serves one log. Invocations are single-writer:
/// concurrent runs are either blocked by the storage revision lease or
/// detected by the revision check and rolled back harmlessly. Dropping an
/// uncommitted transaction discards its staged writes, so every `?` in
/// the pipeline is a rollback.
pub struct Sequencer {
    hasher: TreeHasher,
    time_source: Arc<dyn TimeSource>,
    storage: Arc<dyn LogStorage>,
    signer: Arc<dyn Signer>,
}

impl Sequencer {
    /// Assemble a sequencer from its injected capabilities.
    pub fn new(
        hasher: TreeHasher,
        time_source: Arc<dyn TimeSource>,
        storage: Arc<dyn LogStorage>,
        signer: Arc<dyn Signer>,
    ) -> Self {
        Self {
            hasher,
            time_source,
            storage,
            signer,
        }
    }

    /// Dequeue up to `limit` leaves and integrate them into the tree.
    ///
    /// Returns the number of leaves integrated. When the queue is empty
    /// the transaction commits without writes, and if `is_root_expired`
    /// reports the current root as stale a fresh one is signed in a new
    /// transaction (safe: no writes were pending).
    pub fn sequence_batch(
        &self,
        limit: usize,
        is_root_expired: impl Fn(&SignedLogRoot) -> bool,
    ) -> Result<usize, SequencerError> {
        let mut tx = self.storage.begin()?;

        let leaves = tx.dequeue_leaves(limit)?;
        let current_root = tx.latest_signed_log_root()?;

        if current_root.is_fresh() {
            info!("fresh log, no previous tree heads exist");
        }

        if leaves.is_empty() {
            tx.commit()?;
            if is_root_expired(&current_root) {
                self.sign_root()?;
            }
            return Ok(0);
        }

        let mut tree = self.hydrate_tree(&current_root, tx.as_ref())?;

        // All reads are done; from here on the transaction writes at W.
        let write_revision = tx.write_revision();
        if write_revision != current_root.tree_revision + 1 {
            return Err(SequencerError::RevisionConflict {
                got: write_revision,
                want: current_root.tree_revision + 1,
            });
        }

        // Extend the tree, buffering node updates keyed by coordinate.
        // Within a batch a node may be recomputed several times as leaves
        // stack up; the map keeps only the final hash for each id.
        let mut node_map: HashMap<NodeId, [u8; 32]> = HashMap::new();
        let mut sequence_numbers = Vec::with_capacity(leaves.len());

        for leaf in &leaves {
            let seq = tree.append(leaf.leaf_hash, |level, index, hash| {
                node_map.insert(NodeId::new(level, index), hash);
            });
            node_map.insert(NodeId::new(0, seq), leaf.leaf_hash);
            sequence_numbers.push(seq);
        }

        if sequence_numbers.len() != leaves.len() {
            panic!(
                "sequencer produced {} sequence numbers for {} leaves",
                sequence_numbers.len(),
                leaves.len()
            );
        }

        // Pair leaves with their sequence numbers in batch order.
        let mut leaves = leaves;
        for (leaf, seq) in leaves.iter_mut().zip(&sequence_numbers) {
            leaf.sequence_number = *seq as i64;
        }
        tx.update_sequenced_leaves(&leaves)?;

        let nodes: Vec<Node> = node_map
            .into_iter()
            .map(|(id, hash)| Node {
                id,
                hash,
                revision: write_revision,
            })
            .collect();
        tx.set_merkle_nodes(&nodes)?;

        let new_root = self.build_signed_root(
            current_root.log_id,
            tree.size(),
            tree.current_root(),
            write_revision,
        )?;
        tx.store_signed_log_root(&new_root)?;

        tx.commit()?;

        info!(
            count = leaves.len(),
            tree_size = new_root.tree_size,
            revision = write_revision,
            "integrated batch"
        );
        Ok(leaves.len())
    }

    /// Sign a fresh tree head over the current tree without integrating
    /// any leaves. Bumps the tree revision by one.
    pub fn sign_root(&self) -> Result<(), SequencerError> {
        let mut tx = self.storage.begin()?;

        let current_root = tx.latest_signed_log_root()?;

        // Hydration doubles as a state check: a damaged tree fails here
        // before anything is signed.
        let tree = self.hydrate_tree(&current_root, tx.as_ref())?;

        let new_root = self.build_signed_root(
            current_root.log_id,
            tree.size(),
            tree.current_root(),
            current_root.tree_revision + 1,
        )?;
        tx.store_signed_log_root(&new_root)?;
        tx.commit()?;

        info!(
            tree_size = new_root.tree_size,
            revision = new_root.tree_revision,
            "signed tree head"
        );
        Ok(())
    }

    /// Whether `root` is older than `max_age` according to the injected
    /// time source. A fresh log's zero-valued root always reads expired,
    /// which bootstraps the first signed head.
    pub fn root_expired(&self, root: &SignedLogRoot, max_age: Duration) -> bool {
        let age_nanos = self.time_source.now_nanos() - root.timestamp_nanos;
        age_nanos >= 0 && age_nanos as u128 > max_age.as_nanos()
    }

    /// Build the compact tree at the current root, either empty or
    /// rehydrated from stored nodes at the root's revision.
    fn hydrate_tree(
        &self,
        root: &SignedLogRoot,
        tx: &(dyn LogTransaction + '_),
    ) -> Result<CompactTree, SequencerError> {
        if root.tree_size == 0 {
            return Ok(CompactTree::new(self.hasher));
        }

        let stored_root: [u8; 32] = root.root_hash.as_slice().try_into().map_err(|_| {
            SequencerError::CorruptState(format!(
                "stored root hash has length {}",
                root.root_hash.len()
            ))
        })?;

        let revision = root.tree_revision;
        let tree = CompactTree::from_state(
            self.hasher,
            root.tree_size as u64,
            &stored_root,
            |level, index| {
                let id = NodeId::new(level, index);
                let nodes = tx
                    .get_merkle_nodes(revision, &[id])
                    .map_err(|e| MerkleError::Fetch(e.to_string()))?;
                match nodes.as_slice() {
                    [node] => Ok(node.hash),
                    _ => {
                        warn!(%id, revision, got = nodes.len(), "expected exactly one node");
                        Err(MerkleError::MissingNode(id))
                    }
                }
            },
        )?;

        Ok(tree)
    }

    fn build_signed_root(
        &self,
        log_id: i64,
        tree_size: u64,
        root_hash: [u8; 32],
        tree_revision: i64,
    ) -> Result<SignedLogRoot, SequencerError> {
        let timestamp_nanos = self.time_source.now_nanos();
        let timestamp_millis = (timestamp_nanos / 1_000_000).max(0) as u64;

        let payload = tree_head_signature_payload(timestamp_millis, tree_size, &root_hash);
        let signature = self.signer.sign(&payload)?;

        Ok(SignedLogRoot {
            log_id,
            tree_size: tree_size as i64,
            timestamp_nanos,
            root_hash: root_hash.to_vec(),
            tree_revision,
            signature: Some(signature),
        })
    }
}
