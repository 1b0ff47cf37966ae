//! Integration test: proofs served over HTTP verify against tree heads.
//!
//! Grows the log across several batches, capturing each signed tree
//! head, then checks every inclusion proof and every consistency pair
//! against the RFC 6962 verifiers.

use alder_integration_tests::{TestLog, chain_body, leaf_cert};
use alder_merkle::TreeHasher;
use alder_merkle::proof::{verify_consistency, verify_inclusion};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

fn decode_path(path: &[String]) -> Vec<[u8; 32]> {
    path.iter()
        .map(|node| {
            BASE64
                .decode(node)
                .unwrap()
                .as_slice()
                .try_into()
                .unwrap()
        })
        .collect()
}

async fn submit(log: &TestLog, name: &str) {
    let (status, body) = log
        .post("/ct/v1/add-chain", &chain_body(&[leaf_cert(name)]))
        .await;
    assert_eq!(status, StatusCode::OK, "submit {name}: {body}");
}

#[tokio::test]
async fn test_inclusion_proofs_verify_for_every_leaf() {
    let log = TestLog::new();

    // Three batches: sizes 3, 5, 8.
    for batch in [&["a", "b", "c"][..], &["d", "e"][..], &["f", "g", "h"][..]] {
        for name in batch {
            submit(&log, name).await;
        }
        log.sequence();
    }

    let (_, body) = log.get("/ct/v1/get-sth").await;
    let sth: alder_ct::GetSthResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(sth.tree_size, 8);
    let root: [u8; 32] = BASE64
        .decode(&sth.sha256_root_hash)
        .unwrap()
        .as_slice()
        .try_into()
        .unwrap();

    for index in 0..8u64 {
        // Fetch the leaf, hash it, then ask for its proof by hash.
        let (_, body) = log
            .get(&format!("/ct/v1/get-entries?start={index}&end={index}"))
            .await;
        let entries: alder_ct::GetEntriesResponse = serde_json::from_str(&body).unwrap();
        let leaf_input = BASE64.decode(&entries.entries[0].leaf_input).unwrap();
        let leaf_hash = TreeHasher.hash_leaf(&leaf_input);

        let (status, body) = log
            .get(&format!(
                "/ct/v1/get-proof-by-hash?hash={}&tree_size=8",
                urlencode(&BASE64.encode(leaf_hash))
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "leaf {index}: {body}");
        let proof: alder_ct::GetProofByHashResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(proof.leaf_index, index as i64);

        let path = decode_path(&proof.audit_path);
        assert!(
            verify_inclusion(&TreeHasher, &leaf_hash, index, 8, &path, &root),
            "inclusion proof failed for leaf {index}"
        );
    }
}

#[tokio::test]
async fn test_consistency_proofs_verify_between_all_heads() {
    let log = TestLog::new();
    let mut heads = Vec::new();

    for batch in [&["a"][..], &["b", "c"][..], &["d"][..], &["e", "f", "g"][..]] {
        for name in batch {
            submit(&log, name).await;
        }
        log.sequence();
        heads.push(log.latest_root());
    }

    for first in &heads {
        for second in &heads {
            if first.tree_size >= second.tree_size {
                continue;
            }

            let (status, body) = log
                .get(&format!(
                    "/ct/v1/get-sth-consistency?first={}&second={}",
                    first.tree_size, second.tree_size
                ))
                .await;
            assert_eq!(status, StatusCode::OK, "body: {body}");

            let resp: alder_ct::GetSthConsistencyResponse =
                serde_json::from_str(&body).unwrap();
            let path = decode_path(&resp.consistency);

            assert!(
                verify_consistency(
                    &TreeHasher,
                    first.tree_size as u64,
                    second.tree_size as u64,
                    &first.root_hash.as_slice().try_into().unwrap(),
                    &second.root_hash.as_slice().try_into().unwrap(),
                    &path
                ),
                "consistency {} -> {} failed",
                first.tree_size,
                second.tree_size
            );
        }
    }
}

#[tokio::test]
async fn test_entry_and_proof_round_trip() {
    let log = TestLog::new();
    for name in ["a", "b", "c", "d"] {
        submit(&log, name).await;
    }
    log.sequence();
    let root = log.latest_root();
    let root_hash: [u8; 32] = root.root_hash.as_slice().try_into().unwrap();

    let (status, body) = log
        .get("/ct/v1/get-entry-and-proof?leaf_index=2&tree_size=4")
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let resp: alder_ct::GetEntryAndProofResponse = serde_json::from_str(&body).unwrap();
    let leaf_input = BASE64.decode(&resp.leaf_input).unwrap();
    let leaf_hash = TreeHasher.hash_leaf(&leaf_input);
    let path = decode_path(&resp.audit_path);

    assert!(verify_inclusion(
        &TreeHasher,
        &leaf_hash,
        2,
        4,
        &path,
        &root_hash
    ));
}

/// Percent-encode base64 for use in a query string.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '+' => out.push_str("%2B"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            other => out.push(other),
        }
    }
    out
}
