//! RFC 5246 / RFC 6962 wire structures.
//!
//! Big-endian, length-prefixed TLS encoding for the structures the log
//! commits to and signs: `MerkleTreeLeaf`, the `TreeHeadSignature` and
//! `certificate_timestamp` signing payloads, and the `digitally-signed`
//! wrapper. The encoder and decoder are strict: every length bound of the
//! RFC is enforced and trailing bytes are rejected.

use crate::{DigitallySigned, HashAlgorithm, SignatureAlgorithm};

/// Protocol version `v1` (the only one RFC 6962 defines).
pub const VERSION_V1: u8 = 0;
/// `MerkleLeafType.timestamped_entry`.
pub const LEAF_TYPE_TIMESTAMPED_ENTRY: u8 = 0;
/// `SignatureType.certificate_timestamp` (SCT payloads).
pub const SIGNATURE_TYPE_CERTIFICATE_TIMESTAMP: u8 = 0;
/// `SignatureType.tree_hash` (STH payloads).
pub const SIGNATURE_TYPE_TREE_HASH: u8 = 1;

/// Wire codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Input ended before a field was complete.
    #[error("truncated input reading {0}")]
    Truncated(&'static str),

    /// A variable-length field violated its RFC length bounds.
    #[error("{field} length {len} outside {min}..={max}")]
    LengthOutOfRange {
        /// Field name.
        field: &'static str,
        /// Observed length.
        len: usize,
        /// Minimum allowed.
        min: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Unknown enum value on the wire.
    #[error("unknown {field} value {value}")]
    UnknownValue {
        /// Field name.
        field: &'static str,
        /// Observed value.
        value: u64,
    },

    /// Bytes left over after a complete structure.
    #[error("{0} trailing bytes after structure")]
    TrailingBytes(usize),
}

// ---------------------------------------------------------------------------
// Primitive writer / reader
// ---------------------------------------------------------------------------

/// Big-endian TLS encoder.
#[derive(Debug, Default)]
pub struct TlsWriter {
    buf: Vec<u8>,
}

impl TlsWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a `u8`.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Write a big-endian `u16`.
    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a big-endian 24-bit length.
    fn put_u24(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    /// Write a big-endian `u64`.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write fixed-width bytes (no length prefix).
    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write `opaque field<min..2^16-1>`.
    pub fn put_opaque16(
        &mut self,
        field: &'static str,
        min: usize,
        bytes: &[u8],
    ) -> Result<(), WireError> {
        if bytes.len() < min || bytes.len() > 0xFFFF {
            return Err(WireError::LengthOutOfRange {
                field,
                len: bytes.len(),
                min,
                max: 0xFFFF,
            });
        }
        self.put_u16(bytes.len() as u16);
        self.put_fixed(bytes);
        Ok(())
    }

    /// Write `opaque field<min..2^24-1>`.
    pub fn put_opaque24(
        &mut self,
        field: &'static str,
        min: usize,
        bytes: &[u8],
    ) -> Result<(), WireError> {
        if bytes.len() < min || bytes.len() > 0xFF_FFFF {
            return Err(WireError::LengthOutOfRange {
                field,
                len: bytes.len(),
                min,
                max: 0xFF_FFFF,
            });
        }
        self.put_u24(bytes.len() as u32);
        self.put_fixed(bytes);
        Ok(())
    }

    /// Consume the writer, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Big-endian TLS decoder over a borrowed buffer.
#[derive(Debug)]
pub struct TlsReader<'a> {
    buf: &'a [u8],
}

impl<'a> TlsReader<'a> {
    /// Wrap a buffer.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::Truncated(field));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    /// Read a `u8`.
    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.take(1, field)?[0])
    }

    /// Read a big-endian `u16`.
    pub fn get_u16(&mut self, field: &'static str) -> Result<u16, WireError> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn get_u24(&mut self, field: &'static str) -> Result<u32, WireError> {
        let b = self.take(3, field)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Read a big-endian `u64`.
    pub fn get_u64(&mut self, field: &'static str) -> Result<u64, WireError> {
        let b = self.take(8, field)?;
        Ok(u64::from_be_bytes(b.try_into().unwrap()))
    }

    /// Read fixed-width bytes.
    pub fn get_fixed(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        self.take(n, field)
    }

    /// Read `opaque field<min..2^16-1>`.
    pub fn get_opaque16(
        &mut self,
        field: &'static str,
        min: usize,
    ) -> Result<&'a [u8], WireError> {
        let len = self.get_u16(field)? as usize;
        if len < min {
            return Err(WireError::LengthOutOfRange {
                field,
                len,
                min,
                max: 0xFFFF,
            });
        }
        self.take(len, field)
    }

    /// Read `opaque field<min..2^24-1>`.
    pub fn get_opaque24(
        &mut self,
        field: &'static str,
        min: usize,
    ) -> Result<&'a [u8], WireError> {
        let len = self.get_u24(field)? as usize;
        if len < min {
            return Err(WireError::LengthOutOfRange {
                field,
                len,
                min,
                max: 0xFF_FFFF,
            });
        }
        self.take(len, field)
    }

    /// Require the buffer to be fully consumed.
    pub fn expect_end(&self) -> Result<(), WireError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(WireError::TrailingBytes(self.buf.len()))
        }
    }
}

// ---------------------------------------------------------------------------
// MerkleTreeLeaf
// ---------------------------------------------------------------------------

/// The entry payload inside a `TimestampedEntry` (RFC 6962 §3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignedEntry {
    /// `x509_entry(0)`: a DER certificate.
    X509 {
        /// `opaque ASN.1Cert<1..2^24-1>`.
        cert: Vec<u8>,
    },
    /// `precert_entry(1)`: issuer key hash plus the TBS certificate.
    Precert {
        /// SHA-256 of the issuing key.
        issuer_key_hash: [u8; 32],
        /// `opaque TBSCertificate<1..2^24-1>`.
        tbs: Vec<u8>,
    },
}

impl SignedEntry {
    /// The `LogEntryType` wire value.
    pub fn entry_type(&self) -> u16 {
        match self {
            Self::X509 { .. } => 0,
            Self::Precert { .. } => 1,
        }
    }

    fn encode_into(&self, w: &mut TlsWriter) -> Result<(), WireError> {
        w.put_u16(self.entry_type());
        match self {
            Self::X509 { cert } => w.put_opaque24("asn1_cert", 1, cert),
            Self::Precert {
                issuer_key_hash,
                tbs,
            } => {
                w.put_fixed(issuer_key_hash);
                w.put_opaque24("tbs_certificate", 1, tbs)
            }
        }
    }

    fn decode_from(r: &mut TlsReader<'_>) -> Result<Self, WireError> {
        let entry_type = r.get_u16("entry_type")?;
        match entry_type {
            0 => Ok(Self::X509 {
                cert: r.get_opaque24("asn1_cert", 1)?.to_vec(),
            }),
            1 => {
                let issuer_key_hash: [u8; 32] =
                    r.get_fixed(32, "issuer_key_hash")?.try_into().unwrap();
                Ok(Self::Precert {
                    issuer_key_hash,
                    tbs: r.get_opaque24("tbs_certificate", 1)?.to_vec(),
                })
            }
            other => Err(WireError::UnknownValue {
                field: "entry_type",
                value: other as u64,
            }),
        }
    }
}

/// RFC 6962 §3.4 `MerkleTreeLeaf` — the structure the tree commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTreeLeaf {
    /// Entry timestamp in unix milliseconds.
    pub timestamp_millis: u64,
    /// The certificate or pre-certificate entry.
    pub entry: SignedEntry,
    /// `CtExtensions` — empty in v1.
    pub extensions: Vec<u8>,
}

impl MerkleTreeLeaf {
    /// Canonical serialization: the bytes that get leaf-hashed.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = TlsWriter::new();
        w.put_u8(VERSION_V1);
        w.put_u8(LEAF_TYPE_TIMESTAMPED_ENTRY);
        w.put_u64(self.timestamp_millis);
        self.entry.encode_into(&mut w)?;
        w.put_opaque16("extensions", 0, &self.extensions)?;
        Ok(w.into_bytes())
    }

    /// Strict decode of a canonical serialization.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = TlsReader::new(bytes);
        let version = r.get_u8("version")?;
        if version != VERSION_V1 {
            return Err(WireError::UnknownValue {
                field: "version",
                value: version as u64,
            });
        }
        let leaf_type = r.get_u8("leaf_type")?;
        if leaf_type != LEAF_TYPE_TIMESTAMPED_ENTRY {
            return Err(WireError::UnknownValue {
                field: "leaf_type",
                value: leaf_type as u64,
            });
        }
        let timestamp_millis = r.get_u64("timestamp")?;
        let entry = SignedEntry::decode_from(&mut r)?;
        let extensions = r.get_opaque16("extensions", 0)?.to_vec();
        r.expect_end()?;
        Ok(Self {
            timestamp_millis,
            entry,
            extensions,
        })
    }
}

// ---------------------------------------------------------------------------
// Signing payloads
// ---------------------------------------------------------------------------

/// RFC 6962 §3.5 `TreeHeadSignature` input: what the log signs to commit
/// to a tree head.
pub fn tree_head_signature_payload(
    timestamp_millis: u64,
    tree_size: u64,
    root_hash: &[u8; 32],
) -> Vec<u8> {
    let mut w = TlsWriter::new();
    w.put_u8(VERSION_V1);
    w.put_u8(SIGNATURE_TYPE_TREE_HASH);
    w.put_u64(timestamp_millis);
    w.put_u64(tree_size);
    w.put_fixed(root_hash);
    w.into_bytes()
}

/// RFC 6962 §3.2 `certificate_timestamp` input: what the log signs when
/// issuing an SCT.
pub fn certificate_timestamp_payload(
    timestamp_millis: u64,
    entry: &SignedEntry,
    extensions: &[u8],
) -> Result<Vec<u8>, WireError> {
    let mut w = TlsWriter::new();
    w.put_u8(VERSION_V1);
    w.put_u8(SIGNATURE_TYPE_CERTIFICATE_TIMESTAMP);
    w.put_u64(timestamp_millis);
    entry.encode_into(&mut w)?;
    w.put_opaque16("extensions", 0, extensions)?;
    Ok(w.into_bytes())
}

// ---------------------------------------------------------------------------
// digitally-signed
// ---------------------------------------------------------------------------

impl DigitallySigned {
    /// TLS `digitally-signed` encoding: two algorithm bytes plus
    /// `opaque signature<0..2^16-1>`.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = TlsWriter::new();
        w.put_u8(self.hash_algorithm as u8);
        w.put_u8(self.signature_algorithm as u8);
        w.put_opaque16("signature", 0, &self.signature)?;
        Ok(w.into_bytes())
    }

    /// Strict decode of a TLS `digitally-signed` value.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let mut r = TlsReader::new(bytes);
        let hash = r.get_u8("hash_algorithm")?;
        if hash != HashAlgorithm::Sha256 as u8 {
            return Err(WireError::UnknownValue {
                field: "hash_algorithm",
                value: hash as u64,
            });
        }
        let sig_alg = r.get_u8("signature_algorithm")?;
        let signature_algorithm =
            SignatureAlgorithm::from_wire(sig_alg).ok_or(WireError::UnknownValue {
                field: "signature_algorithm",
                value: sig_alg as u64,
            })?;
        let signature = r.get_opaque16("signature", 0)?.to_vec();
        r.expect_end()?;
        Ok(Self {
            hash_algorithm: HashAlgorithm::Sha256,
            signature_algorithm,
            signature,
        })
    }
}

/// Encode a certificate chain as a length-prefixed list of DER certs
/// (`ASN.1Cert` list inside `opaque<0..2^24-1>`). Used for `extra_data`.
pub fn encode_chain(certs: &[Vec<u8>]) -> Result<Vec<u8>, WireError> {
    let mut inner = TlsWriter::new();
    for cert in certs {
        inner.put_opaque24("asn1_cert", 1, cert)?;
    }
    let list = inner.into_bytes();

    let mut w = TlsWriter::new();
    w.put_opaque24("certificate_chain", 0, &list)?;
    Ok(w.into_bytes())
}

/// Decode a certificate chain encoded by [`encode_chain`].
pub fn decode_chain(bytes: &[u8]) -> Result<Vec<Vec<u8>>, WireError> {
    let mut outer = TlsReader::new(bytes);
    let list = outer.get_opaque24("certificate_chain", 0)?;
    outer.expect_end()?;

    let mut r = TlsReader::new(list);
    let mut certs = Vec::new();
    while !r.is_empty() {
        certs.push(r.get_opaque24("asn1_cert", 1)?.to_vec());
    }
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaf() -> MerkleTreeLeaf {
        MerkleTreeLeaf {
            timestamp_millis: 12_345,
            entry: SignedEntry::X509 {
                cert: b"certdatacertdata".to_vec(),
            },
            extensions: Vec::new(),
        }
    }

    #[test]
    fn test_merkle_tree_leaf_layout() {
        let bytes = sample_leaf().encode().unwrap();

        // version, leaf_type, u64 timestamp, u16 entry_type, u24 length,
        // 16 cert bytes, u16 extensions length.
        assert_eq!(bytes.len(), 1 + 1 + 8 + 2 + 3 + 16 + 2);
        assert_eq!(bytes[0], VERSION_V1);
        assert_eq!(bytes[1], LEAF_TYPE_TIMESTAMPED_ENTRY);
        assert_eq!(&bytes[2..10], &12_345u64.to_be_bytes());
        assert_eq!(&bytes[10..12], &[0, 0]); // x509_entry
        assert_eq!(&bytes[12..15], &[0, 0, 16]); // cert length
        assert_eq!(&bytes[15..31], b"certdatacertdata");
        assert_eq!(&bytes[31..], &[0, 0]); // empty extensions
    }

    #[test]
    fn test_merkle_tree_leaf_round_trip() {
        let leaf = sample_leaf();
        let decoded = MerkleTreeLeaf::decode(&leaf.encode().unwrap()).unwrap();
        assert_eq!(decoded, leaf);
    }

    #[test]
    fn test_precert_leaf_round_trip() {
        let leaf = MerkleTreeLeaf {
            timestamp_millis: 67_890,
            entry: SignedEntry::Precert {
                issuer_key_hash: [0xAB; 32],
                tbs: vec![0x30, 0x03, 0x02, 0x01, 0x01],
            },
            extensions: Vec::new(),
        };
        let decoded = MerkleTreeLeaf::decode(&leaf.encode().unwrap()).unwrap();
        assert_eq!(decoded, leaf);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = sample_leaf().encode().unwrap();
        bytes.push(0);
        assert!(matches!(
            MerkleTreeLeaf::decode(&bytes),
            Err(WireError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let bytes = sample_leaf().encode().unwrap();
        for cut in [0, 1, 5, 11, 14, bytes.len() - 1] {
            assert!(
                MerkleTreeLeaf::decode(&bytes[..cut]).is_err(),
                "truncation at {cut} must fail"
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = sample_leaf().encode().unwrap();
        bytes[0] = 9;
        assert!(matches!(
            MerkleTreeLeaf::decode(&bytes),
            Err(WireError::UnknownValue {
                field: "version",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_cert_rejected() {
        let leaf = MerkleTreeLeaf {
            timestamp_millis: 1,
            entry: SignedEntry::X509 { cert: Vec::new() },
            extensions: Vec::new(),
        };
        assert!(matches!(
            leaf.encode(),
            Err(WireError::LengthOutOfRange { field: "asn1_cert", .. })
        ));
    }

    #[test]
    fn test_tree_head_signature_payload_layout() {
        let payload = tree_head_signature_payload(12_345, 3, &[0x42; 32]);
        assert_eq!(payload.len(), 1 + 1 + 8 + 8 + 32);
        assert_eq!(payload[0], VERSION_V1);
        assert_eq!(payload[1], SIGNATURE_TYPE_TREE_HASH);
        assert_eq!(&payload[2..10], &12_345u64.to_be_bytes());
        assert_eq!(&payload[10..18], &3u64.to_be_bytes());
        assert_eq!(&payload[18..], &[0x42; 32]);
    }

    #[test]
    fn test_certificate_timestamp_payload_starts_with_sct_header() {
        let payload = certificate_timestamp_payload(
            5,
            &SignedEntry::X509 {
                cert: vec![1, 2, 3],
            },
            &[],
        )
        .unwrap();
        assert_eq!(payload[0], VERSION_V1);
        assert_eq!(payload[1], SIGNATURE_TYPE_CERTIFICATE_TIMESTAMP);
    }

    #[test]
    fn test_digitally_signed_round_trip() {
        let ds = DigitallySigned {
            hash_algorithm: HashAlgorithm::Sha256,
            signature_algorithm: SignatureAlgorithm::Ed25519,
            signature: vec![9u8; 64],
        };
        let decoded = DigitallySigned::decode(&ds.encode().unwrap()).unwrap();
        assert_eq!(decoded, ds);
    }

    #[test]
    fn test_chain_round_trip() {
        let chain = vec![vec![1u8, 2, 3], vec![4u8; 300]];
        let encoded = encode_chain(&chain).unwrap();
        assert_eq!(decode_chain(&encoded).unwrap(), chain);
    }

    #[test]
    fn test_empty_chain_round_trip() {
        let encoded = encode_chain(&[]).unwrap();
        assert_eq!(decode_chain(&encoded).unwrap(), Vec::<Vec<u8>>::new());
    }
}
