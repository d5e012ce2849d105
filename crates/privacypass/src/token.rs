//! Redeemed tokens

use crate::challenge::{ChallengeContext, NONCE_LEN};
use crate::error::{Error, Result};
use crate::token_type::TokenType;
use crate::wire::Reader;

/// Length of the Issuer key id carried in a token.
pub const KEY_ID_LEN: usize = 32;

/// A token as presented in `Authorization: PrivateToken token=...`.
///
/// `u16 type ‖ nonce[32] ‖ context[32] ‖ key_id[32] ‖ authenticator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub nonce: [u8; NONCE_LEN],
    pub context: ChallengeContext,
    pub key_id: [u8; KEY_ID_LEN],
    pub authenticator: Vec<u8>,
}

impl Token {
    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes, "token");
        let token_type = TokenType::try_from(r.read_u16()?)?;
        let nonce = r.read_array::<NONCE_LEN>()?;
        let context = ChallengeContext::from_bytes(r.read_array::<32>()?);
        let key_id = r.read_array::<KEY_ID_LEN>()?;
        let authenticator = r.rest().to_vec();
        if authenticator.is_empty() {
            return Err(Error::Malformed("token authenticator"));
        }
        Ok(Self {
            token_type,
            nonce,
            context,
            key_id,
            authenticator,
        })
    }

    pub fn marshal(&self) -> Vec<u8> {
        let mut out = self.authenticator_input();
        out.extend_from_slice(&self.authenticator);
        out
    }

    /// Everything the authenticator signs: the token minus the authenticator.
    pub fn authenticator_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + NONCE_LEN + 32 + KEY_ID_LEN);
        out.extend_from_slice(&self.token_type.tag().to_be_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(self.context.as_bytes());
        out.extend_from_slice(&self.key_id);
        out
    }
}
