//! Shared test harness for alder integration tests.
//!
//! Provides [`TestLog`] — a full in-process log node: in-memory storage,
//! a sequencer with a frozen clock, and the CT HTTP router — plus
//! builders for minimal DER certificates that chain to the harness's
//! trusted root.

use std::sync::Arc;
use std::time::Duration;

use alder_ct::{CertPool, CtConfig, CtServer, CtServerConfig, StaticPoolValidator, StorageBackend};
use alder_merkle::TreeHasher;
use alder_sequencer::Sequencer;
use alder_storage::{LogReader as _, LogStorage, MemoryLogStorage};
use alder_types::{Ed25519Signer, FixedTimeSource, SignedLogRoot};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Frozen wall-clock time used by every harness instance.
pub const TEST_MILLIS: u64 = 1_469_185_273_000;

/// Ed25519 seed of the harness log key.
pub const TEST_SIGNER_SEED: [u8; 32] = [42u8; 32];

/// A complete in-process log node.
pub struct TestLog {
    /// Shared in-memory storage.
    pub storage: Arc<MemoryLogStorage>,
    /// The integration pipeline.
    pub sequencer: Sequencer,
    /// The CT HTTP router.
    pub router: Router,
    /// The log's signer (for verifying SCTs and tree heads).
    pub signer: Arc<Ed25519Signer>,
    /// The frozen clock.
    pub time: Arc<FixedTimeSource>,
}

impl TestLog {
    /// Build a node whose trusted pool contains [`root_cert`].
    pub fn new() -> Self {
        let storage = Arc::new(MemoryLogStorage::new(1));
        let time = Arc::new(FixedTimeSource::at_millis(TEST_MILLIS));
        let signer = Arc::new(Ed25519Signer::from_seed(&TEST_SIGNER_SEED));

        let sequencer = Sequencer::new(
            TreeHasher,
            time.clone(),
            storage.clone(),
            signer.clone(),
        );

        let mut pool = CertPool::new();
        pool.add_cert(root_cert()).expect("root cert must parse");
        let roots = Arc::new(pool);

        let router = CtServer::new(CtServerConfig {
            backend: Arc::new(StorageBackend::new(storage.clone())),
            validator: Arc::new(StaticPoolValidator::new(roots.clone())),
            roots,
            signer: signer.clone(),
            time_source: time.clone(),
            config: CtConfig {
                rpc_timeout: Duration::from_millis(500),
                max_get_entries: 1_000,
            },
        })
        .into_router();

        Self {
            storage,
            sequencer,
            router,
            signer,
            time,
        }
    }

    /// Run one sequencing pass, returning the number of leaves integrated.
    pub fn sequence(&self) -> usize {
        self.sequencer
            .sequence_batch(50, |_| false)
            .expect("sequencing must succeed")
    }

    /// The latest committed signed log root.
    pub fn latest_root(&self) -> SignedLogRoot {
        self.storage
            .snapshot()
            .unwrap()
            .latest_signed_log_root()
            .unwrap()
    }

    /// Issue a GET request against the router.
    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }

    /// Issue a POST request with a JSON body against the router.
    pub async fn post(&self, path: &str, body: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).to_string())
    }
}

impl Default for TestLog {
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------
// Synthetic certificates
// -----------------------------------------------------------------------

/// The RFC 6962 poison extension OID content bytes.
const POISON_OID: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xD6, 0x79, 0x02, 0x04, 0x03];

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    match content.len() {
        n @ 0..=0x7F => out.push(n as u8),
        n @ 0x80..=0xFF => {
            out.push(0x81);
            out.push(n as u8);
        }
        n => {
            out.push(0x82);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
    }
    out.extend_from_slice(content);
    out
}

fn der_name(common_name: &str) -> Vec<u8> {
    tlv(0x30, &tlv(0x0C, common_name.as_bytes()))
}

/// Build a minimal but structurally valid DER certificate.
pub fn test_cert(subject: &str, issuer: &str, poison: bool) -> Vec<u8> {
    let mut tbs = Vec::new();
    tbs.extend(tlv(0x02, &[0x01]));
    tbs.extend(tlv(0x30, &[]));
    tbs.extend(der_name(issuer));
    tbs.extend(tlv(0x30, &[]));
    tbs.extend(der_name(subject));
    tbs.extend(tlv(0x30, subject.as_bytes()));
    if poison {
        let extension = tlv(
            0x30,
            &[
                tlv(0x06, POISON_OID),
                tlv(0x01, &[0xFF]),
                tlv(0x04, &[0x05, 0x00]),
            ]
            .concat(),
        );
        tbs.extend(tlv(0xA3, &tlv(0x30, &extension)));
    }

    let tbs = tlv(0x30, &tbs);
    let mut cert = tbs;
    cert.extend(tlv(0x30, &[]));
    cert.extend(tlv(0x03, &[0x00]));
    tlv(0x30, &cert)
}

/// The harness's trusted root.
pub fn root_cert() -> Vec<u8> {
    test_cert("Integration Root CA", "Integration Root CA", false)
}

/// A leaf certificate issued by [`root_cert`], unique per `name`.
pub fn leaf_cert(name: &str) -> Vec<u8> {
    test_cert(name, "Integration Root CA", false)
}

/// A poisoned pre-certificate issued by [`root_cert`].
pub fn precert(name: &str) -> Vec<u8> {
    test_cert(name, "Integration Root CA", true)
}

/// JSON body for an add-chain submission.
pub fn chain_body(chain: &[Vec<u8>]) -> String {
    let encoded: Vec<String> = chain.iter().map(|c| BASE64.encode(c)).collect();
    serde_json::json!({ "chain": encoded }).to_string()
}
