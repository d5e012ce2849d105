//! Privacy Pass protocol primitives
//!
//! Wire formats and verification helpers shared by the Attester and Origin
//! services. Nothing in this crate holds state or performs I/O; every function
//! is a pure transformation over bytes so the services can own all
//! concurrency and network concerns.
//!
//! Covered here:
//! 1. `TokenType`: the closed set of supported issuance protocols
//! 2. `TokenChallenge` / `ChallengeContext`: what an Origin hands out
//! 3. `Token`: what a client redeems
//! 4. `RateLimitedTokenRequest`: what a client sends to the Attester
//! 5. `sfv`: RFC 8941 byte-sequence header values
//! 6. `finalize_index`: the per-(client, origin) anonymized index
//! 7. `TokenKey`: Issuer public keys and authenticator verification

pub mod challenge;
pub mod constants;
pub mod error;
pub mod index;
pub mod keys;
pub mod request;
pub mod sfv;
pub mod token;
pub mod token_type;
mod wire;

pub use challenge::{ChallengeContext, NONCE_LEN, TokenChallenge};
pub use constants::*;
pub use error::{Error, Result};
pub use index::{INDEX_LEN, finalize_index};
pub use keys::TokenKey;
pub use request::RateLimitedTokenRequest;
pub use token::Token;
pub use token_type::TokenType;
