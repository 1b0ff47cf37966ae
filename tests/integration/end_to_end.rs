//! Integration test: submit → sequence → serve.
//!
//! Drives the full pipeline over the HTTP surface: chains are admitted
//! through add-chain / add-pre-chain, integrated by the sequencer, and
//! read back through get-sth, get-entries, and get-roots.

use alder_integration_tests::{TestLog, chain_body, leaf_cert, precert, TEST_MILLIS};
use alder_merkle::TreeHasher;
use alder_types::wire::{MerkleTreeLeaf, SignedEntry, certificate_timestamp_payload};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Verifier;

#[tokio::test]
async fn test_add_chain_sequence_and_read_back() {
    let log = TestLog::new();
    let cert = leaf_cert("e2e.example.com");

    // Submit over HTTP; the SCT must verify against the log key.
    let (status, body) = log.post("/ct/v1/add-chain", &chain_body(&[cert.clone()])).await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    let sct: alder_ct::SctResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(sct.timestamp, TEST_MILLIS);

    let payload = certificate_timestamp_payload(
        TEST_MILLIS,
        &SignedEntry::X509 { cert: cert.clone() },
        &[],
    )
    .unwrap();
    let signed =
        alder_types::DigitallySigned::decode(&BASE64.decode(&sct.signature).unwrap()).unwrap();
    let sig = ed25519_dalek::Signature::from_slice(&signed.signature).unwrap();
    log.signer.verifying_key().verify(&payload, &sig).unwrap();

    // Integrate and read the tree head back over HTTP.
    assert_eq!(log.sequence(), 1);

    let (status, body) = log.get("/ct/v1/get-sth").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let sth: alder_ct::GetSthResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(sth.tree_size, 1);
    assert_eq!(sth.timestamp, TEST_MILLIS);

    // The served entry decodes to the submitted certificate.
    let (status, body) = log.get("/ct/v1/get-entries?start=0&end=0").await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    let entries: alder_ct::GetEntriesResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(entries.entries.len(), 1);

    let leaf_input = BASE64.decode(&entries.entries[0].leaf_input).unwrap();
    let leaf = MerkleTreeLeaf::decode(&leaf_input).unwrap();
    assert_eq!(leaf.entry, SignedEntry::X509 { cert });

    // The single-leaf tree's root is the leaf hash.
    let leaf_hash = TreeHasher.hash_leaf(&leaf_input);
    assert_eq!(sth.sha256_root_hash, BASE64.encode(leaf_hash));
}

#[tokio::test]
async fn test_add_pre_chain_end_to_end() {
    let log = TestLog::new();

    let (status, body) = log
        .post("/ct/v1/add-pre-chain", &chain_body(&[precert("pre.example.com")]))
        .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");

    assert_eq!(log.sequence(), 1);

    let (_, body) = log.get("/ct/v1/get-entries?start=0&end=0").await;
    let entries: alder_ct::GetEntriesResponse = serde_json::from_str(&body).unwrap();
    let leaf_input = BASE64.decode(&entries.entries[0].leaf_input).unwrap();
    let leaf = MerkleTreeLeaf::decode(&leaf_input).unwrap();
    assert!(matches!(leaf.entry, SignedEntry::Precert { .. }));
}

#[tokio::test]
async fn test_duplicate_submission_is_integrated_once() {
    let log = TestLog::new();
    let body = chain_body(&[leaf_cert("dup.example.com")]);

    let (first, _) = log.post("/ct/v1/add-chain", &body).await;
    let (second, _) = log.post("/ct/v1/add-chain", &body).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);

    // Storage suppressed the duplicate leaf hash.
    assert_eq!(log.sequence(), 1);
    assert_eq!(log.latest_root().tree_size, 1);
}

#[tokio::test]
async fn test_rejected_chain_leaves_queue_untouched() {
    let log = TestLog::new();

    // Pre-cert to add-chain, unknown issuer, and garbage all get 400.
    let cases = [
        chain_body(&[precert("bad.example.com")]),
        chain_body(&[alder_integration_tests::test_cert("x", "Nobody CA", false)]),
        r#"{ "chain": [] }"#.to_string(),
    ];
    for body in &cases {
        let (status, _) = log.post("/ct/v1/add-chain", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    use alder_storage::LogStorage;
    assert_eq!(log.storage.pending_count().unwrap(), 0);
    assert_eq!(log.sequence(), 0);
}

#[tokio::test]
async fn test_get_roots_serves_the_pool() {
    let log = TestLog::new();
    let (status, body) = log.get("/ct/v1/get-roots").await;
    assert_eq!(status, StatusCode::OK);

    let roots: alder_ct::GetRootsResponse = serde_json::from_str(&body).unwrap();
    assert_eq!(
        roots.certificates,
        vec![BASE64.encode(alder_integration_tests::root_cert())]
    );
}
