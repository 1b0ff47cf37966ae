//! Signed certificate timestamps.

use alder_types::Signer;
use alder_types::wire::{SignedEntry, certificate_timestamp_payload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::error::CtError;

/// The `add-chain` / `add-pre-chain` success body (RFC 6962 §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SctResponse {
    /// SCT version, always 0 (v1).
    pub sct_version: u8,
    /// Base64 log key id (`SHA-256(public key)`).
    pub id: String,
    /// Entry timestamp in unix milliseconds.
    pub timestamp: u64,
    /// Base64 CT extensions; empty in v1.
    pub extensions: String,
    /// Base64 TLS `digitally-signed` over the `certificate_timestamp`
    /// structure.
    pub signature: String,
}

/// Sign an SCT over the timestamped entry.
pub(crate) fn build_sct(
    signer: &dyn Signer,
    timestamp_millis: u64,
    entry: &SignedEntry,
) -> Result<SctResponse, CtError> {
    let payload = certificate_timestamp_payload(timestamp_millis, entry, &[])
        .map_err(|e| CtError::BadRequest(format!("cannot serialize entry: {e}")))?;

    let signed = signer
        .sign(&payload)
        .map_err(|e| CtError::Crypto(e.to_string()))?;
    let encoded = signed
        .encode()
        .map_err(|e| CtError::Crypto(e.to_string()))?;

    Ok(SctResponse {
        sct_version: 0,
        id: BASE64.encode(signer.key_id()),
        timestamp: timestamp_millis,
        extensions: String::new(),
        signature: BASE64.encode(encoded),
    })
}
