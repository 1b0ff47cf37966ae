//! Signing capability for tree heads and SCTs.
//!
//! The sequencer and the CT front-end consume an opaque [`Signer`]; the
//! production implementation is [`Ed25519Signer`]. The algorithm travels
//! with every signature ([`DigitallySigned`]) so logs can be provisioned
//! with a different scheme without touching the callers.

use ed25519_dalek::{Signer as _, SigningKey};
use sha2::{Digest, Sha256};

use crate::{DigitallySigned, HashAlgorithm, SignatureAlgorithm};

/// Errors from the signing backend.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// The key manager or signing device refused the operation.
    #[error("signing backend failure: {0}")]
    Backend(String),
}

/// Capability for producing detached signatures with the log's private key.
pub trait Signer: Send + Sync {
    /// Sign the payload, returning the signature with its algorithm ids.
    fn sign(&self, payload: &[u8]) -> Result<DigitallySigned, SignError>;

    /// The log key id: `SHA-256(public key)`. Used as the SCT `id` field.
    fn key_id(&self) -> [u8; 32];

    /// Algorithm this signer produces.
    fn algorithm(&self) -> SignatureAlgorithm;
}

/// Ed25519 log signer.
pub struct Ed25519Signer {
    key: SigningKey,
    key_id: [u8; 32],
}

impl Ed25519Signer {
    /// Wrap an existing signing key.
    pub fn new(key: SigningKey) -> Self {
        let key_id = Sha256::digest(key.verifying_key().as_bytes()).into();
        Self { key, key_id }
    }

    /// Derive a signer from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(seed))
    }

    /// The public half, for out-of-band verification.
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.key.verifying_key()
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, payload: &[u8]) -> Result<DigitallySigned, SignError> {
        let signature = self.key.sign(payload);
        Ok(DigitallySigned {
            hash_algorithm: HashAlgorithm::Sha256,
            signature_algorithm: SignatureAlgorithm::Ed25519,
            signature: signature.to_bytes().to_vec(),
        })
    }

    fn key_id(&self) -> [u8; 32] {
        self.key_id
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::Ed25519
    }
}
