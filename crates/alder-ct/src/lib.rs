//! RFC 6962 HTTP/JSON front-end for the alder log.
//!
//! Provides a [`CtServer`] that exposes the `/ct/v1/*` endpoints over an
//! axum router:
//!
//! - `POST add-chain` / `POST add-pre-chain` — admission: chain validation
//!   against the trusted-root pool, leaf construction, SCT issuance, and
//!   queueing into the log backend.
//! - `GET get-sth`, `get-sth-consistency`, `get-proof-by-hash`,
//!   `get-entries`, `get-entry-and-proof` — proof serving with strict
//!   parameter validation and response-shape checks.
//! - `GET get-roots` — the trusted root pool.
//!
//! POST routes reject GET with 405 and vice versa. Backend calls run
//! under a per-request RPC deadline.

mod backend;
mod chain;
mod der;
mod error;
mod handlers;
mod sct;


use std::sync::Arc;
use std::time::Duration;

use alder_types::{Signer, TimeSource};
use axum::Router;
use axum::routing::{get, post};

pub use backend::{BackendError, LogBackend, StorageBackend};
pub use chain::{CertPool, ChainError, ChainValidator, StaticPoolValidator, ValidatedChain};
pub use der::DerError;
pub use error::CtError;
pub use handlers::{
    GetEntriesResponse, GetEntryAndProofResponse, GetProofByHashResponse, GetRootsResponse,
    GetSthConsistencyResponse, GetSthResponse,
};
pub use sct::SctResponse;

/// Front-end tuning.
#[derive(Debug, Clone)]
pub struct CtConfig {
    /// Deadline for each backend call.
    pub rpc_timeout: Duration,
    /// Maximum entries one `get-entries` request may ask for.
    pub max_get_entries: u64,
}

impl Default for CtConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_millis(500),
            max_get_entries: 1_000,
        }
    }
}

/// Shared state for all CT handlers.
#[derive(Clone)]
pub(crate) struct AppState {
    pub backend: Arc<dyn LogBackend>,
    pub validator: Arc<dyn ChainValidator>,
    pub roots: Arc<CertPool>,
    pub signer: Arc<dyn Signer>,
    pub time_source: Arc<dyn TimeSource>,
    pub config: Arc<CtConfig>,
}

/// Configuration for creating a [`CtServer`].
pub struct CtServerConfig {
    /// Log backend client.
    pub backend: Arc<dyn LogBackend>,
    /// Chain validation service.
    pub validator: Arc<dyn ChainValidator>,
    /// Trusted roots (served by `get-roots`).
    pub roots: Arc<CertPool>,
    /// SCT / tree-head signer.
    pub signer: Arc<dyn Signer>,
    /// Time capability.
    pub time_source: Arc<dyn TimeSource>,
    /// Front-end tuning.
    pub config: CtConfig,
}

/// The CT HTTP server.
pub struct CtServer {
    router: Router,
}

impl CtServer {
    /// Build the server from its configuration.
    pub fn new(config: CtServerConfig) -> Self {
        let state = AppState {
            backend: config.backend,
            validator: config.validator,
            roots: config.roots,
            signer: config.signer,
            time_source: config.time_source,
            config: Arc::new(config.config),
        };

        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/ct/v1/add-chain", post(handlers::add_chain))
            .route("/ct/v1/add-pre-chain", post(handlers::add_pre_chain))
            .route("/ct/v1/get-sth", get(handlers::get_sth))
            .route(
                "/ct/v1/get-sth-consistency",
                get(handlers::get_sth_consistency),
            )
            .route("/ct/v1/get-proof-by-hash", get(handlers::get_proof_by_hash))
            .route("/ct/v1/get-entries", get(handlers::get_entries))
            .route("/ct/v1/get-roots", get(handlers::get_roots))
            .route(
                "/ct/v1/get-entry-and-proof",
                get(handlers::get_entry_and_proof),
            )
            .with_state(state)
    }

    /// Return the inner [`Router`] (useful for testing with
    /// `tower::ServiceExt`).
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on the given TCP address.
    pub async fn serve(self, addr: &str) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "CT API listening");
        axum::serve(listener, self.router).await
    }

    /// Serve with graceful shutdown triggered by the given future.
    pub async fn serve_with_shutdown(
        self,
        addr: &str,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(addr, "CT API listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
