//! Error types for protocol decoding and verification

/// Errors from decoding or verifying protocol messages.
///
/// Every variant describes bad input from a peer; callers map all of them
/// to a client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unsupported token type: {0:#06x}")]
    UnsupportedTokenType(u16),

    #[error("malformed {0}")]
    Malformed(&'static str),

    #[error("{0} has trailing bytes")]
    TrailingBytes(&'static str),

    #[error("{0} exceeds its length prefix")]
    TooLong(&'static str),

    #[error("invalid structured header value: {0}")]
    StructuredHeader(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("index derivation failed: {0}")]
    Index(String),
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;
