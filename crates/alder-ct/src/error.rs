//! Front-end error type and HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::chain::ChainError;

/// Errors surfaced by the CT handlers.
///
/// Client-visible errors are final; nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum CtError {
    /// Syntactically invalid or policy-violating request. 400.
    #[error("{0}")]
    BadRequest(String),

    /// Submitted chain rejected by the validator. 400.
    #[error("chain verification failed: {0}")]
    Chain(#[from] ChainError),

    /// The log backend failed, timed out, or returned non-OK. 500.
    #[error("backend rpc failed: {0}")]
    Backend(String),

    /// The backend returned a structurally impossible answer. 500.
    /// This is a data-integrity signal worth alerting on.
    #[error("{0}")]
    InvalidBackendResponse(String),

    /// The signer refused or failed. 500.
    #[error("signing failed: {0}")]
    Crypto(String),
}

impl CtError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Chain(_) => StatusCode::BAD_REQUEST,
            Self::Backend(_) | Self::InvalidBackendResponse(_) | Self::Crypto(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for CtError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_string();

        if status.is_server_error() {
            warn!(%status, %body, "request failed");
        }

        (status, body).into_response()
    }
}
