//! Redemption errors
//!
//! Everything a client can get wrong is a 400. A resource fetch that fails
//! after a valid redemption is a 502.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid authorization: {0}")]
    InvalidAuthorization(String),

    #[error("invalid token: {0}")]
    Protocol(#[from] privacypass::Error),

    #[error("no outstanding challenge for context {0}")]
    UnknownChallenge(privacypass::ChallengeContext),

    #[error("resource unavailable: {0}")]
    Resource(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Resource(_) => StatusCode::BAD_GATEWAY,
            Error::InvalidAuthorization(_) | Error::Protocol(_) | Error::UnknownChallenge(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Label for the `type` field of the error body and the outcome metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAuthorization(_) => "invalid_authorization",
            Error::Protocol(privacypass::Error::SignatureInvalid) => "verification_failed",
            Error::Protocol(_) => "malformed_token",
            Error::UnknownChallenge(_) => "unknown_challenge",
            Error::Resource(_) => "resource_unavailable",
        }
    }

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

pub type Result<T> = std::result::Result<T, Error>;
