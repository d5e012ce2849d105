//! Error types for quota decisions

/// Reasons the ledger refuses a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The re-derived index differs from the one bound to this pair.
    #[error("index mismatch for client {client_id}")]
    IndexMismatch { client_id: String },

    #[error("issuance limit {limit} reached for client {client_id}")]
    QuotaExceeded { client_id: String, limit: u64 },
}

/// Result alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;
