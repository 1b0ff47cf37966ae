//! Shared types and capabilities for the alder transparency log.
//!
//! This crate defines the data model used across the alder workspace:
//! queued and sequenced leaves ([`Leaf`]), signed tree heads
//! ([`SignedLogRoot`]), Merkle node coordinates ([`NodeId`], [`Node`]),
//! proofs ([`Proof`]), and the injected capabilities for time
//! ([`TimeSource`]) and signing ([`Signer`]). The [`wire`] module carries
//! the RFC 5246 / RFC 6962 TLS wire codec shared by the sequencer and the
//! CT front-end.

pub mod sign;
pub mod time;
pub mod wire;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use sign::{Ed25519Signer, SignError, Signer};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource};

/// Sequence number of a leaf that has been queued but not yet integrated.
pub const SEQUENCE_NUMBER_PENDING: i64 = -1;

// ---------------------------------------------------------------------------
// Leaves
// ---------------------------------------------------------------------------

/// A log leaf: the unit the Merkle tree commits to.
///
/// Submitted leaves sit in the pending queue with
/// `sequence_number == -1`; the sequencer assigns dense, strictly
/// increasing sequence numbers at integration time and they never change
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// `SHA-256(0x00 || leaf_data)` — the RFC 6962 leaf hash.
    pub leaf_hash: [u8; 32],
    /// Canonical serialized `MerkleTreeLeaf` bytes — what the tree commits to.
    pub leaf_data: Vec<u8>,
    /// Uncommitted side data (the rest of the submitted chain, for auditors).
    pub extra_data: Vec<u8>,
    /// Assigned on integration; [`SEQUENCE_NUMBER_PENDING`] while queued.
    pub sequence_number: i64,
    /// Unix milliseconds when the leaf entered the queue.
    pub queued_at_millis: u64,
}

impl Leaf {
    /// Create a pending (not yet sequenced) leaf.
    pub fn pending(
        leaf_hash: [u8; 32],
        leaf_data: Vec<u8>,
        extra_data: Vec<u8>,
        queued_at_millis: u64,
    ) -> Self {
        Self {
            leaf_hash,
            leaf_data,
            extra_data,
            sequence_number: SEQUENCE_NUMBER_PENDING,
            queued_at_millis,
        }
    }
}

// ---------------------------------------------------------------------------
// Merkle node coordinates
// ---------------------------------------------------------------------------

/// Coordinate of a Merkle tree node: level above the leaves plus
/// horizontal index within that level.
///
/// Level 0 is the leaf layer. The canonical storage encoding is 9 bytes,
/// `level || big-endian index`, which sorts nodes first by level and then
/// by position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    /// Level above the leaf layer (0 = leaves).
    pub level: u8,
    /// Horizontal index within the level.
    pub index: u64,
}

impl NodeId {
    /// Create a node id from tree coordinates.
    pub fn new(level: u8, index: u64) -> Self {
        Self { level, index }
    }

    /// Canonical 9-byte storage encoding: `level || big-endian index`.
    pub fn to_bytes(self) -> [u8; 9] {
        let mut out = [0u8; 9];
        out[0] = self.level;
        out[1..].copy_from_slice(&self.index.to_be_bytes());
        out
    }

    /// Decode the canonical 9-byte encoding. Returns `None` on bad length.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: &[u8; 9] = bytes.try_into().ok()?;
        let mut index = [0u8; 8];
        index.copy_from_slice(&arr[1..]);
        Some(Self {
            level: arr[0],
            index: u64::from_be_bytes(index),
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.level, self.index)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({self})")
    }
}

/// A Merkle tree node row: coordinate, hash, and the tree revision that
/// wrote it. Rows are immutable per `(id, revision)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Tree coordinate.
    pub id: NodeId,
    /// Domain-separated subtree hash.
    pub hash: [u8; 32],
    /// Tree revision that produced this row.
    pub revision: i64,
}

// ---------------------------------------------------------------------------
// Signed log roots
// ---------------------------------------------------------------------------

/// A signed tree head: the log's commitment to its contents at a point
/// in time.
///
/// `tree_revision` is the internal storage version: strictly increasing,
/// bumped by every integration batch and by every forced re-sign. A fresh
/// log is represented by the zero-valued root (`tree_size == 0`,
/// `tree_revision == 0`, empty `root_hash`, no signature).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedLogRoot {
    /// Log identifier, fixed per log at provisioning.
    pub log_id: i64,
    /// Number of integrated leaves. Signed on the wire; consumers must
    /// reject negative values.
    pub tree_size: i64,
    /// Unix nanoseconds when this root was produced.
    pub timestamp_nanos: i64,
    /// Tree root hash at `tree_size`. Empty for a fresh log, else 32 bytes.
    pub root_hash: Vec<u8>,
    /// Monotonic storage revision.
    pub tree_revision: i64,
    /// Detached signature over the RFC 6962 tree head structure.
    pub signature: Option<DigitallySigned>,
}

impl SignedLogRoot {
    /// The zero-valued root storage returns for a log with no tree heads.
    pub fn zero(log_id: i64) -> Self {
        Self {
            log_id,
            tree_size: 0,
            timestamp_nanos: 0,
            root_hash: Vec::new(),
            tree_revision: 0,
            signature: None,
        }
    }

    /// Whether this is the zero-valued root of a fresh log.
    pub fn is_fresh(&self) -> bool {
        self.root_hash.is_empty()
    }

    /// Root timestamp in unix milliseconds (the unit the wire format uses).
    pub fn timestamp_millis(&self) -> u64 {
        (self.timestamp_nanos / 1_000_000).max(0) as u64
    }
}

/// TLS `HashAlgorithm` registry values (RFC 5246 §7.4.1.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256 = 4,
}

/// TLS `SignatureAlgorithm` registry values.
///
/// Carried per log rather than hard-coded so the algorithm is negotiable
/// at provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureAlgorithm {
    /// ECDSA (RFC 5246 value 3).
    Ecdsa = 3,
    /// Ed25519 (RFC 8422 value 7).
    Ed25519 = 7,
}

impl SignatureAlgorithm {
    /// Decode a registry value.
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            3 => Some(Self::Ecdsa),
            7 => Some(Self::Ed25519),
            _ => None,
        }
    }
}

/// A detached TLS `digitally-signed` value: algorithm identifiers plus
/// the raw signature bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitallySigned {
    /// Hash algorithm used for the signature input.
    pub hash_algorithm: HashAlgorithm,
    /// Signature algorithm.
    pub signature_algorithm: SignatureAlgorithm,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// An RFC 6962 audit or consistency path returned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Index of the proven leaf (inclusion proofs; -1 for consistency).
    pub leaf_index: i64,
    /// Sibling hashes, leaf-to-root order.
    pub hashes: Vec<Vec<u8>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_round_trip() {
        let id = NodeId::new(7, 0x0102_0304_0506_0708);
        let bytes = id.to_bytes();
        assert_eq!(bytes[0], 7);
        assert_eq!(NodeId::from_bytes(&bytes), Some(id));
    }

    #[test]
    fn test_node_id_bytes_order_by_level_then_index() {
        let a = NodeId::new(0, u64::MAX).to_bytes();
        let b = NodeId::new(1, 0).to_bytes();
        assert!(a < b, "lower level must sort before higher level");

        let c = NodeId::new(3, 5).to_bytes();
        let d = NodeId::new(3, 6).to_bytes();
        assert!(c < d, "same level must sort by index");
    }

    #[test]
    fn test_node_id_from_bytes_rejects_bad_length() {
        assert_eq!(NodeId::from_bytes(&[1, 2, 3]), None);
        assert_eq!(NodeId::from_bytes(&[0u8; 10]), None);
    }

    #[test]
    fn test_zero_root_is_fresh() {
        let root = SignedLogRoot::zero(42);
        assert!(root.is_fresh());
        assert_eq!(root.tree_size, 0);
        assert_eq!(root.tree_revision, 0);
        assert!(root.signature.is_none());
    }

    #[test]
    fn test_timestamp_millis_conversion() {
        let mut root = SignedLogRoot::zero(1);
        root.timestamp_nanos = 12_345_000_000;
        assert_eq!(root.timestamp_millis(), 12_345);
    }

    #[test]
    fn test_pending_leaf_sequence_number() {
        let leaf = Leaf::pending([0u8; 32], vec![1], vec![], 1000);
        assert_eq!(leaf.sequence_number, SEQUENCE_NUMBER_PENDING);
    }
}
