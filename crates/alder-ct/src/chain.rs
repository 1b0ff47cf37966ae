//! Trusted-root pool and chain validation.
//!
//! The admission pipeline consumes chain validation through the
//! [`ChainValidator`] capability: "does this chain build to a trusted
//! root", plus the facts needed to construct the log entry (pre-cert
//! poison, issuer key hash, TBS bytes). [`StaticPoolValidator`] is the
//! production implementation over a fixed [`CertPool`] loaded at startup;
//! tests inject their own validators.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

use crate::der::{self, DerError, PRECERT_POISON_OID};

/// Chain validation failures. All of them surface as 400s.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No certificates submitted.
    #[error("empty chain")]
    Empty,

    /// A chain element is not a parseable certificate.
    #[error("certificate {index} failed to parse: {source}")]
    BadCertificate {
        /// Position in the submitted chain.
        index: usize,
        /// Underlying DER failure.
        #[source]
        source: DerError,
    },

    /// A certificate is not issued by its successor in the chain.
    #[error("certificate {0} is not issued by the next certificate in the chain")]
    BrokenChain(usize),

    /// The chain does not terminate at a trusted root.
    #[error("chain does not build to a trusted root")]
    UntrustedRoot,

    /// A PEM block failed to decode.
    #[error("invalid PEM certificate block")]
    BadPem,
}

/// An immutable pool of trusted root certificates (DER).
///
/// Loaded once at startup and shared read-only across requests.
#[derive(Debug, Default)]
pub struct CertPool {
    certs: Vec<Vec<u8>>,
}

impl CertPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one DER certificate, validating that it parses.
    pub fn add_cert(&mut self, der: Vec<u8>) -> Result<(), ChainError> {
        der::parse_certificate(&der).map_err(|source| ChainError::BadCertificate {
            index: self.certs.len(),
            source,
        })?;
        self.certs.push(der);
        Ok(())
    }

    /// Add every `CERTIFICATE` block from a PEM bundle. Returns the
    /// number of certificates added.
    pub fn add_pem(&mut self, pem: &str) -> Result<usize, ChainError> {
        let mut added = 0;
        let mut collecting = false;
        let mut b64 = String::new();

        for line in pem.lines() {
            let line = line.trim();
            if line == "-----BEGIN CERTIFICATE-----" {
                collecting = true;
                b64.clear();
            } else if line == "-----END CERTIFICATE-----" {
                if !collecting {
                    return Err(ChainError::BadPem);
                }
                let der = BASE64.decode(&b64).map_err(|_| ChainError::BadPem)?;
                self.add_cert(der)?;
                added += 1;
                collecting = false;
            } else if collecting {
                b64.push_str(line);
            }
        }

        if collecting {
            return Err(ChainError::BadPem);
        }
        Ok(added)
    }

    /// The raw DER certificates, in insertion order (served by get-roots).
    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certs
    }

    /// Number of certificates in the pool.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    fn contains(&self, der: &[u8]) -> bool {
        self.certs.iter().any(|c| c.as_slice() == der)
    }

    /// Find a pool certificate whose subject equals `issuer_name`
    /// (full Name TLV bytes).
    fn find_by_subject(&self, issuer_name: &[u8]) -> Option<&[u8]> {
        self.certs.iter().map(|c| c.as_slice()).find(|c| {
            der::parse_certificate(c)
                .map(|view| view.subject == issuer_name)
                .unwrap_or(false)
        })
    }
}

/// Outcome of successful chain validation.
#[derive(Debug, Clone)]
pub struct ValidatedChain {
    /// Ordered canonical chain, leaf first, ending at or chaining into
    /// the trusted root (appended from the pool when omitted).
    pub chain: Vec<Vec<u8>>,
    /// Whether the leaf carries the pre-certificate poison extension.
    pub is_precert: bool,
    /// SHA-256 of the issuing certificate's `SubjectPublicKeyInfo`.
    pub issuer_key_hash: [u8; 32],
    /// The leaf's `tbsCertificate` bytes.
    pub leaf_tbs: Vec<u8>,
}

/// Capability consumed by the admission pipeline.
pub trait ChainValidator: Send + Sync {
    /// Validate a submitted chain (leaf first, DER elements).
    fn validate(&self, raw_chain: &[Vec<u8>]) -> Result<ValidatedChain, ChainError>;
}

/// Chain validation against a fixed trusted-root pool.
///
/// Checks structure (every element parses), linkage (each certificate's
/// issuer name matches its successor's subject name), and anchoring (the
/// last element either is a pool root or is issued by one, in which case
/// the root is appended to the canonical chain).
pub struct StaticPoolValidator {
    roots: Arc<CertPool>,
}

impl StaticPoolValidator {
    /// Validator over the given pool.
    pub fn new(roots: Arc<CertPool>) -> Self {
        Self { roots }
    }
}

impl ChainValidator for StaticPoolValidator {
    fn validate(&self, raw_chain: &[Vec<u8>]) -> Result<ValidatedChain, ChainError> {
        if raw_chain.is_empty() {
            return Err(ChainError::Empty);
        }

        let views = raw_chain
            .iter()
            .enumerate()
            .map(|(index, der)| {
                der::parse_certificate(der)
                    .map_err(|source| ChainError::BadCertificate { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for i in 0..views.len() - 1 {
            if views[i].issuer != views[i + 1].subject {
                return Err(ChainError::BrokenChain(i));
            }
        }

        let last = &views[views.len() - 1];
        let mut chain = raw_chain.to_vec();
        let appended_root = if self.roots.contains(raw_chain[raw_chain.len() - 1].as_slice()) {
            None
        } else {
            let root = self
                .roots
                .find_by_subject(last.issuer)
                .ok_or(ChainError::UntrustedRoot)?;
            chain.push(root.to_vec());
            Some(root.to_vec())
        };

        let leaf = &views[0];
        let is_precert = leaf
            .has_extension(PRECERT_POISON_OID)
            .map_err(|source| ChainError::BadCertificate { index: 0, source })?;

        // The issuing certificate is the leaf's successor in the canonical
        // chain; a leaf that itself is a trusted root issues itself.
        let issuer_spki: Vec<u8> = if views.len() >= 2 {
            views[1].spki.to_vec()
        } else if let Some(root) = &appended_root {
            der::parse_certificate(root)
                .map_err(|source| ChainError::BadCertificate { index: 1, source })?
                .spki
                .to_vec()
        } else {
            leaf.spki.to_vec()
        };

        Ok(ValidatedChain {
            chain,
            is_precert,
            issuer_key_hash: Sha256::digest(&issuer_spki).into(),
            leaf_tbs: leaf.tbs.to_vec(),
        })
    }
}
