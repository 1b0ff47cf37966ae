//! CT API request handlers.
//!
//! One public function per `/ct/v1/*` endpoint. Every handler is
//! stateless: parameters are validated up front (any violation is a 400
//! with a short textual reason, and no backend call is made), backend
//! calls run under the configured RPC deadline, and backend answers are
//! validated before anything is returned (structurally impossible answers
//! are 500s with a specific reason).

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use alder_merkle::TreeHasher;
use alder_types::wire::{MerkleTreeLeaf, SignedEntry, encode_chain, tree_head_signature_payload};
use alder_types::{Leaf, Proof};
use axum::Json;
use axum::extract::{Query, State};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::backend::BackendError;
use crate::error::CtError;
use crate::sct::{SctResponse, build_sct};

// -----------------------------------------------------------------------
// Request / response bodies (field names per RFC 6962 §4)
// -----------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddChainRequest {
    chain: Vec<String>,
}

/// `get-sth` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetSthResponse {
    /// Number of integrated leaves.
    pub tree_size: u64,
    /// Tree head timestamp, unix milliseconds.
    pub timestamp: u64,
    /// Base64 root hash.
    pub sha256_root_hash: String,
    /// Base64 TLS `digitally-signed` tree head signature.
    pub tree_head_signature: String,
}

/// `get-sth-consistency` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetSthConsistencyResponse {
    /// Base64 consistency path nodes.
    pub consistency: Vec<String>,
}

/// `get-proof-by-hash` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetProofByHashResponse {
    /// Index of the proven leaf.
    pub leaf_index: i64,
    /// Base64 audit path nodes.
    pub audit_path: Vec<String>,
}

/// One `get-entries` entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntriesEntry {
    /// Base64 `MerkleTreeLeaf` bytes, passed through verbatim.
    pub leaf_input: String,
    /// Base64 auditor side data.
    pub extra_data: String,
}

/// `get-entries` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntriesResponse {
    /// Entries in index order.
    pub entries: Vec<GetEntriesEntry>,
}

/// `get-roots` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetRootsResponse {
    /// Base64 DER trusted root certificates.
    pub certificates: Vec<String>,
}

/// `get-entry-and-proof` response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntryAndProofResponse {
    /// Base64 `MerkleTreeLeaf` bytes.
    pub leaf_input: String,
    /// Base64 auditor side data.
    pub extra_data: String,
    /// Base64 audit path nodes.
    pub audit_path: Vec<String>,
}

// -----------------------------------------------------------------------
// Shared helpers
// -----------------------------------------------------------------------

/// Run a backend call under the configured RPC deadline.
async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, CtError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CtError::Backend(e.to_string())),
        Err(_) => Err(CtError::Backend("rpc deadline exceeded".to_string())),
    }
}

/// Parse a required integer query parameter.
fn int_param(params: &HashMap<String, String>, name: &str) -> Result<i64, CtError> {
    let raw = params
        .get(name)
        .ok_or_else(|| CtError::BadRequest(format!("missing parameter: {name}")))?;
    raw.parse::<i64>()
        .map_err(|_| CtError::BadRequest(format!("parameter {name} is not a valid number: {raw}")))
}

/// Base64-encode a proof path, rejecting zero-length nodes.
fn validated_path(proof: &Proof) -> Result<Vec<String>, CtError> {
    proof
        .hashes
        .iter()
        .map(|node| {
            if node.is_empty() {
                Err(CtError::InvalidBackendResponse(
                    "invalid proof: zero-length node".to_string(),
                ))
            } else {
                Ok(BASE64.encode(node))
            }
        })
        .collect()
}

// -----------------------------------------------------------------------
// POST /ct/v1/add-chain and /ct/v1/add-pre-chain
// -----------------------------------------------------------------------

#[derive(Clone, Copy)]
enum SubmissionKind {
    Certificate,
    Precertificate,
}

/// Handle `add-chain`: admit a certificate chain and return an SCT.
pub(crate) async fn add_chain(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SctResponse>, CtError> {
    submit_chain(state, body, SubmissionKind::Certificate).await
}

/// Handle `add-pre-chain`: admit a pre-certificate chain and return an SCT.
pub(crate) async fn add_pre_chain(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<SctResponse>, CtError> {
    submit_chain(state, body, SubmissionKind::Precertificate).await
}

async fn submit_chain(
    state: AppState,
    body: String,
    kind: SubmissionKind,
) -> Result<Json<SctResponse>, CtError> {
    let request: AddChainRequest = serde_json::from_str(&body)
        .map_err(|e| CtError::BadRequest(format!("invalid json body: {e}")))?;
    if request.chain.is_empty() {
        return Err(CtError::BadRequest("empty chain".to_string()));
    }

    let der_chain = request
        .chain
        .iter()
        .enumerate()
        .map(|(i, b64)| {
            BASE64
                .decode(b64)
                .map_err(|_| CtError::BadRequest(format!("chain element {i} is not valid base64")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let validated = state.validator.validate(&der_chain)?;

    match kind {
        SubmissionKind::Certificate if validated.is_precert => {
            return Err(CtError::BadRequest(
                "precertificate submitted to add-chain".to_string(),
            ));
        }
        SubmissionKind::Precertificate if !validated.is_precert => {
            return Err(CtError::BadRequest(
                "add-pre-chain requires a precertificate".to_string(),
            ));
        }
        _ => {}
    }

    let timestamp_millis = state.time_source.now_millis();
    let entry = match kind {
        SubmissionKind::Certificate => SignedEntry::X509 {
            cert: validated.chain[0].clone(),
        },
        SubmissionKind::Precertificate => SignedEntry::Precert {
            issuer_key_hash: validated.issuer_key_hash,
            tbs: validated.leaf_tbs.clone(),
        },
    };

    let leaf_data = MerkleTreeLeaf {
        timestamp_millis,
        entry: entry.clone(),
        extensions: Vec::new(),
    }
    .encode()
    .map_err(|e| CtError::BadRequest(format!("cannot serialize leaf: {e}")))?;

    let leaf_hash = TreeHasher.hash_leaf(&leaf_data);
    let extra_data = encode_chain(&validated.chain)
        .map_err(|e| CtError::BadRequest(format!("cannot serialize chain: {e}")))?;

    let sct = build_sct(state.signer.as_ref(), timestamp_millis, &entry)?;

    let leaf = Leaf::pending(leaf_hash, leaf_data, extra_data, timestamp_millis);
    with_deadline(state.config.rpc_timeout, state.backend.queue_leaves(vec![leaf])).await?;

    info!(precert = matches!(kind, SubmissionKind::Precertificate), "chain admitted");
    Ok(Json(sct))
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-sth
// -----------------------------------------------------------------------

/// Handle `get-sth`: return the current signed tree head.
pub(crate) async fn get_sth(
    State(state): State<AppState>,
) -> Result<Json<GetSthResponse>, CtError> {
    let root = with_deadline(
        state.config.rpc_timeout,
        state.backend.latest_signed_log_root(),
    )
    .await?;

    if root.tree_size < 0 {
        return Err(CtError::InvalidBackendResponse(format!(
            "bad tree size: {}",
            root.tree_size
        )));
    }
    let root_hash: [u8; 32] = root.root_hash.as_slice().try_into().map_err(|_| {
        CtError::InvalidBackendResponse(format!("bad hash size: {}", root.root_hash.len()))
    })?;

    let payload =
        tree_head_signature_payload(root.timestamp_millis(), root.tree_size as u64, &root_hash);
    let signature = state
        .signer
        .sign(&payload)
        .map_err(|e| CtError::Crypto(e.to_string()))?
        .encode()
        .map_err(|e| CtError::Crypto(e.to_string()))?;

    Ok(Json(GetSthResponse {
        tree_size: root.tree_size as u64,
        timestamp: root.timestamp_millis(),
        sha256_root_hash: BASE64.encode(root_hash),
        tree_head_signature: BASE64.encode(signature),
    }))
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-sth-consistency
// -----------------------------------------------------------------------

/// Handle `get-sth-consistency`: proof that one tree head extends another.
pub(crate) async fn get_sth_consistency(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetSthConsistencyResponse>, CtError> {
    let first = int_param(&params, "first")?;
    let second = int_param(&params, "second")?;
    if first <= 0 {
        return Err(CtError::BadRequest(format!(
            "first must be greater than zero: {first}"
        )));
    }
    if first >= second {
        return Err(CtError::BadRequest(format!(
            "first must be less than second: {first} >= {second}"
        )));
    }

    let proof = with_deadline(
        state.config.rpc_timeout,
        state
            .backend
            .get_consistency_proof(first as u64, second as u64),
    )
    .await?;

    Ok(Json(GetSthConsistencyResponse {
        consistency: validated_path(&proof)?,
    }))
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-proof-by-hash
// -----------------------------------------------------------------------

/// Handle `get-proof-by-hash`: audit path for a leaf hash.
pub(crate) async fn get_proof_by_hash(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetProofByHashResponse>, CtError> {
    let hash_b64 = params
        .get("hash")
        .ok_or_else(|| CtError::BadRequest("missing parameter: hash".to_string()))?;
    let leaf_hash = BASE64
        .decode(hash_b64)
        .map_err(|_| CtError::BadRequest("hash is not valid base64".to_string()))?;
    if leaf_hash.is_empty() {
        return Err(CtError::BadRequest("hash is empty".to_string()));
    }
    let tree_size = int_param(&params, "tree_size")?;
    if tree_size < 1 {
        return Err(CtError::BadRequest(format!(
            "tree_size must be at least 1: {tree_size}"
        )));
    }

    let proofs = with_deadline(
        state.config.rpc_timeout,
        state
            .backend
            .get_inclusion_proof_by_hash(leaf_hash, tree_size as u64),
    )
    .await?;

    // Duplicate leaves yield several candidate proofs; serve the first.
    let Some(proof) = proofs.first() else {
        return Err(CtError::Backend(
            "no proof found for leaf hash".to_string(),
        ));
    };

    Ok(Json(GetProofByHashResponse {
        leaf_index: proof.leaf_index,
        audit_path: validated_path(proof)?,
    }))
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-entries
// -----------------------------------------------------------------------

/// Handle `get-entries`: a contiguous range of leaves.
pub(crate) async fn get_entries(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntriesResponse>, CtError> {
    let start = int_param(&params, "start")?;
    let end = int_param(&params, "end")?;
    if start < 0 || end < 0 {
        return Err(CtError::BadRequest(format!(
            "parameters must not be negative: start {start}, end {end}"
        )));
    }
    if start > end {
        return Err(CtError::BadRequest(format!(
            "invalid range: start {start} after end {end}"
        )));
    }
    let count = (end - start + 1) as u64;
    if count > state.config.max_get_entries {
        return Err(CtError::BadRequest(format!(
            "requested {count} entries, limit is {}",
            state.config.max_get_entries
        )));
    }

    let indices: Vec<u64> = (start as u64..=end as u64).collect();
    let leaves = with_deadline(
        state.config.rpc_timeout,
        state.backend.get_leaves_by_index(indices),
    )
    .await?;

    // The log may legitimately hold fewer entries than requested, but
    // never more, and indices must be contiguous from start.
    if leaves.len() as u64 > count {
        return Err(CtError::InvalidBackendResponse(format!(
            "too many leaves: got {}, requested {count}",
            leaves.len()
        )));
    }
    for (i, leaf) in leaves.iter().enumerate() {
        let expected = start + i as i64;
        if leaf.sequence_number != expected {
            return Err(CtError::InvalidBackendResponse(format!(
                "non contiguous leaf indices: got {} at position {i}, expected {expected}",
                leaf.sequence_number
            )));
        }
    }

    // Leaf bytes are passed through verbatim; a leaf that does not parse
    // as a MerkleTreeLeaf is still served.
    let entries = leaves
        .iter()
        .map(|leaf| GetEntriesEntry {
            leaf_input: BASE64.encode(&leaf.leaf_data),
            extra_data: BASE64.encode(&leaf.extra_data),
        })
        .collect();

    Ok(Json(GetEntriesResponse { entries }))
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-roots
// -----------------------------------------------------------------------

/// Handle `get-roots`: the trusted root certificates.
pub(crate) async fn get_roots(
    State(state): State<AppState>,
) -> Json<GetRootsResponse> {
    let certificates = state
        .roots
        .certificates()
        .iter()
        .map(|der| BASE64.encode(der))
        .collect();
    Json(GetRootsResponse { certificates })
}

// -----------------------------------------------------------------------
// GET /ct/v1/get-entry-and-proof
// -----------------------------------------------------------------------

/// Handle `get-entry-and-proof`: one leaf plus its audit path.
pub(crate) async fn get_entry_and_proof(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<GetEntryAndProofResponse>, CtError> {
    let leaf_index = int_param(&params, "leaf_index")?;
    let tree_size = int_param(&params, "tree_size")?;
    if tree_size < 1 {
        return Err(CtError::BadRequest(format!(
            "tree_size must be at least 1: {tree_size}"
        )));
    }
    if leaf_index < 0 || leaf_index >= tree_size {
        return Err(CtError::BadRequest(format!(
            "leaf_index {leaf_index} outside tree of size {tree_size}"
        )));
    }

    let (leaf, proof) = with_deadline(
        state.config.rpc_timeout,
        state
            .backend
            .get_entry_and_proof(leaf_index as u64, tree_size as u64),
    )
    .await?;

    Ok(Json(GetEntryAndProofResponse {
        leaf_input: BASE64.encode(&leaf.leaf_data),
        extra_data: BASE64.encode(&leaf.extra_data),
        audit_path: validated_path(&proof)?,
    }))
}
