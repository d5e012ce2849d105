//! Quota ledger state machine
//!
//! One `tokio::sync::Mutex` guards the whole client map. Every admission runs
//! its lookup, index comparison and increment inside a single critical
//! section with no `.await` in between, so concurrent requests for the same
//! pair are counted exactly once each.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Everything the Attester knows about one client.
///
/// Keys of both maps are raw anonymized origin ids.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    indices: HashMap<Vec<u8>, Vec<u8>>,
    counts: HashMap<Vec<u8>, u64>,
}

impl ClientState {
    pub fn index(&self, origin_id: &[u8]) -> Option<&[u8]> {
        self.indices.get(origin_id).map(Vec::as_slice)
    }

    pub fn count(&self, origin_id: &[u8]) -> u64 {
        self.counts.get(origin_id).copied().unwrap_or(0)
    }

    pub fn origins(&self) -> usize {
        self.indices.len()
    }
}

/// A granted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// Tokens granted for this pair, including this one.
    pub count: u64,
    /// Whether this request established the pair's index binding.
    pub new_binding: bool,
}

/// Process-wide issuance ledger keyed by client id.
#[derive(Debug, Default)]
pub struct QuotaLedger {
    clients: Mutex<HashMap<String, ClientState>>,
}

impl QuotaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or refuse one issuance for (client, origin) under `limit`.
    ///
    /// A pair seen for the first time is bound to `index`. Refused requests
    /// never change the count, so it never exceeds `limit`.
    pub async fn admit(
        &self,
        client_id: &str,
        origin_id: &[u8],
        index: &[u8],
        limit: u64,
    ) -> Result<Admission> {
        let mut clients = self.clients.lock().await;
        let state = clients.entry(client_id.to_string()).or_insert_with(|| {
            info!(client_id, "initializing state for new client");
            ClientState::default()
        });

        let origin = hex::encode(origin_id);
        let new_binding = match state.indices.get(origin_id) {
            None => {
                info!(client_id, origin = %origin, "recording new origin for client");
                state.indices.insert(origin_id.to_vec(), index.to_vec());
                true
            }
            Some(bound) if bound.as_slice() != index => {
                warn!(
                    client_id,
                    origin = %origin,
                    "index mismatch for bound client/origin pair, possible replay or forged request"
                );
                return Err(Error::IndexMismatch {
                    client_id: client_id.to_string(),
                });
            }
            Some(_) => false,
        };

        let count = state.counts.entry(origin_id.to_vec()).or_insert(0);
        if *count >= limit {
            info!(client_id, origin = %origin, limit, "issuance limit reached");
            return Err(Error::QuotaExceeded {
                client_id: client_id.to_string(),
                limit,
            });
        }
        *count += 1;
        debug!(client_id, origin = %origin, count = *count, limit, "issuance admitted");

        Ok(Admission {
            count: *count,
            new_binding,
        })
    }

    /// Snapshot of one client's state.
    pub async fn client(&self, client_id: &str) -> Option<ClientState> {
        self.clients.lock().await.get(client_id).cloned()
    }

    /// Number of clients with any recorded state.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
