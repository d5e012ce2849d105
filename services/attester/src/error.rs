//! Per-request error types for the token request endpoint
//!
//! Every variant is answered with a JSON error body. Quota exhaustion is the
//! only one with its own status; all others are client errors, including
//! Issuer failures, since the Attester acts as a gateway for one attempt.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid token request: {0}")]
    Protocol(#[from] privacypass::Error),

    #[error("issuer request failed: {0}")]
    Upstream(String),

    #[error("invalid issuer response: {0}")]
    IssuerResponse(String),

    #[error("invalid client/origin mapping")]
    IndexMismatch,

    #[error("issuance limit of {0} exceeded")]
    QuotaExceeded(u64),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            Error::InvalidRequest(_)
            | Error::Protocol(_)
            | Error::Upstream(_)
            | Error::IssuerResponse(_)
            | Error::IndexMismatch => StatusCode::BAD_REQUEST,
        }
    }

    /// Label for the `type` field of the error body and the outcome metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::Protocol(privacypass::Error::SignatureInvalid) => "signature_invalid",
            Error::Protocol(_) => "protocol_error",
            Error::Upstream(_) => "upstream_error",
            Error::IssuerResponse(_) => "issuer_response_invalid",
            Error::IndexMismatch => "index_mismatch",
            Error::QuotaExceeded(_) => "quota_exceeded",
        }
    }

    /// Render as the JSON error body, tagged with the request id.
    pub fn into_response_with_id(self, request_id: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
                "request_id": request_id,
            }
        });
        (
            self.status(),
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<issuance_quota::Error> for Error {
    fn from(err: issuance_quota::Error) -> Self {
        match err {
            issuance_quota::Error::IndexMismatch { .. } => Error::IndexMismatch,
            issuance_quota::Error::QuotaExceeded { limit, .. } => Error::QuotaExceeded(limit),
        }
    }
}

/// Result alias using the request Error
pub type Result<T> = std::result::Result<T, Error>;
