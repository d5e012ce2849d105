//! Token challenges and their contexts
//!
//! An Origin hands a serialized `TokenChallenge` to the client; the client
//! later redeems a token carrying `SHA-256(serialized challenge)` as its
//! context. Challenges that serialize identically share a context, so the
//! context alone cannot tell them apart.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::token_type::TokenType;
use crate::wire::{Reader, put_u8_prefixed, put_u16_prefixed};

/// Length of an interactive redemption nonce.
pub const NONCE_LEN: usize = 32;

/// Challenge issued by an Origin.
///
/// An empty `redemption_nonce` marks a non-interactive challenge; an empty
/// `origin_info` marks a cross-origin one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChallenge {
    pub token_type: TokenType,
    pub issuer_name: String,
    pub redemption_nonce: Vec<u8>,
    pub origin_info: Vec<String>,
}

impl TokenChallenge {
    /// `u16 type ‖ u16-len issuer ‖ u8-len nonce ‖ u16-len comma-joined origins`
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let origin_info = self.origin_info.join(",");
        let mut out = Vec::with_capacity(
            7 + self.issuer_name.len() + self.redemption_nonce.len() + origin_info.len(),
        );
        out.extend_from_slice(&self.token_type.tag().to_be_bytes());
        put_u16_prefixed(&mut out, self.issuer_name.as_bytes(), "issuer name")?;
        put_u8_prefixed(&mut out, &self.redemption_nonce, "redemption nonce")?;
        put_u16_prefixed(&mut out, origin_info.as_bytes(), "origin info")?;
        Ok(out)
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes, "token challenge");
        let token_type = TokenType::try_from(r.read_u16()?)?;
        let issuer_name = utf8(r.read_u16_prefixed()?, "issuer name")?;
        let redemption_nonce = r.read_u8_prefixed()?.to_vec();
        if !redemption_nonce.is_empty() && redemption_nonce.len() != NONCE_LEN {
            return Err(Error::Malformed("redemption nonce"));
        }
        let origin_info = utf8(r.read_u16_prefixed()?, "origin info")?;
        r.finish()?;

        let origin_info = if origin_info.is_empty() {
            Vec::new()
        } else {
            origin_info.split(',').map(str::to_owned).collect()
        };
        Ok(Self {
            token_type,
            issuer_name,
            redemption_nonce,
            origin_info,
        })
    }

    pub fn is_interactive(&self) -> bool {
        !self.redemption_nonce.is_empty()
    }

    pub fn is_cross_origin(&self) -> bool {
        self.origin_info.is_empty()
    }
}

fn utf8(bytes: &[u8], what: &'static str) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::Malformed(what))
}

/// SHA-256 digest of a serialized challenge.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeContext([u8; 32]);

impl ChallengeContext {
    pub fn of(encoded_challenge: &[u8]) -> Self {
        Self(Sha256::digest(encoded_challenge).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ChallengeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ChallengeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChallengeContext({self})")
    }
}
