//! Supported token types
//!
//! The two-byte tag at the front of every token request, challenge and token
//! selects the issuance protocol. Only the variants below are understood;
//! anything else is rejected at the boundary so every downstream `match` is
//! exhaustive.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// Publicly verifiable blind RSA tokens, no rate limiting.
    Basic,
    /// Rate-limited tokens issued through an Attester.
    RateLimited,
}

impl TokenType {
    pub const BASIC_TAG: u16 = 0x0002;
    pub const RATE_LIMITED_TAG: u16 = 0x0003;

    /// Wire value.
    pub fn tag(self) -> u16 {
        match self {
            TokenType::Basic => Self::BASIC_TAG,
            TokenType::RateLimited => Self::RATE_LIMITED_TAG,
        }
    }

    /// Label for logs and metrics.
    pub fn label(self) -> &'static str {
        match self {
            TokenType::Basic => "basic",
            TokenType::RateLimited => "rate_limited",
        }
    }

    /// Read the token type from the first two bytes of a message.
    pub fn peek(message: &[u8]) -> Result<Self> {
        match message {
            [hi, lo, ..] => Self::try_from(u16::from_be_bytes([*hi, *lo])),
            _ => Err(Error::Malformed("token type tag")),
        }
    }
}

impl TryFrom<u16> for TokenType {
    type Error = Error;

    fn try_from(tag: u16) -> Result<Self> {
        match tag {
            Self::BASIC_TAG => Ok(TokenType::Basic),
            Self::RATE_LIMITED_TAG => Ok(TokenType::RateLimited),
            other => Err(Error::UnsupportedTokenType(other)),
        }
    }
}

impl From<TokenType> for u16 {
    fn from(token_type: TokenType) -> u16 {
        token_type.tag()
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_protocol_values() {
        assert_eq!(TokenType::Basic.tag(), 0x0002);
        assert_eq!(TokenType::RateLimited.tag(), 0x0003);
        assert_eq!(TokenType::try_from(0x0002), Ok(TokenType::Basic));
        assert_eq!(TokenType::try_from(0x0003), Ok(TokenType::RateLimited));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(
            TokenType::try_from(0x0001),
            Err(Error::UnsupportedTokenType(0x0001))
        );
        assert_eq!(
            TokenType::try_from(0xda7a),
            Err(Error::UnsupportedTokenType(0xda7a))
        );
    }

    #[test]
    fn peek_reads_big_endian_prefix() {
        assert_eq!(TokenType::peek(&[0x00, 0x03, 0xff]), Ok(TokenType::RateLimited));
        assert_eq!(TokenType::peek(&[0x00, 0x02]), Ok(TokenType::Basic));
    }

    #[test]
    fn peek_short_message_is_malformed() {
        assert!(matches!(TokenType::peek(&[]), Err(Error::Malformed(_))));
        assert!(matches!(TokenType::peek(&[0x00]), Err(Error::Malformed(_))));
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(TokenType::RateLimited.to_string(), "rate_limited");
    }
}
