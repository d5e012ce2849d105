//! Per-client, per-origin issuance quota for the Attester
//!
//! The ledger remembers, for every client id, which anonymized origins it has
//! requested tokens for, the index that binds the client to each origin, and
//! how many tokens were granted for that pair.
//!
//! Pair lifecycle:
//! 1. First request for (client, origin) → index recorded, count = 1
//! 2. Later request, same index → count incremented while it stays ≤ limit
//! 3. Later request, same index, limit reached → `QuotaExceeded`, count unchanged
//! 4. Later request, different index → `IndexMismatch`, nothing changes
//!
//! State is in-memory only and lives as long as the ledger.

pub mod error;
pub mod ledger;

pub use error::{Error, Result};
pub use ledger::{Admission, ClientState, QuotaLedger};
