//! Rate-limited token requests
//!
//! The client signs its request with an ephemeral P-384 request key so the
//! Attester can reject tampered requests before spending an Issuer round
//! trip on them.

use p384::ecdsa::signature::Verifier;
use p384::ecdsa::{Signature, VerifyingKey};

use crate::error::{Error, Result};
use crate::token_type::TokenType;
use crate::wire::{Reader, put_u16_prefixed};

/// Compressed SEC1 P-384 point.
pub const REQUEST_KEY_LEN: usize = 49;
pub const NAME_KEY_ID_LEN: usize = 32;
/// ECDSA P-384 `r ‖ s`.
pub const SIGNATURE_LEN: usize = 96;

/// `u16 type ‖ u8 token_key_id ‖ request_key[49] ‖ name_key_id[32] ‖
/// u16-len encrypted_token_request ‖ signature[96]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitedTokenRequest {
    pub token_key_id: u8,
    pub request_key: Vec<u8>,
    pub name_key_id: [u8; NAME_KEY_ID_LEN],
    pub encrypted_token_request: Vec<u8>,
    pub signature: Vec<u8>,
}

impl RateLimitedTokenRequest {
    pub fn unmarshal(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::new(bytes, "rate-limited token request");
        match TokenType::try_from(r.read_u16()?)? {
            TokenType::RateLimited => {}
            TokenType::Basic => return Err(Error::Malformed("rate-limited token request")),
        }
        let token_key_id = r.read_u8()?;
        let request_key = r.read_bytes(REQUEST_KEY_LEN)?.to_vec();
        let name_key_id = r.read_array::<NAME_KEY_ID_LEN>()?;
        let encrypted_token_request = r.read_u16_prefixed()?.to_vec();
        if encrypted_token_request.is_empty() {
            return Err(Error::Malformed("encrypted token request"));
        }
        let signature = r.read_bytes(SIGNATURE_LEN)?.to_vec();
        r.finish()?;

        Ok(Self {
            token_key_id,
            request_key,
            name_key_id,
            encrypted_token_request,
            signature,
        })
    }

    pub fn marshal(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&TokenType::RateLimited.tag().to_be_bytes());
        out.push(self.token_key_id);
        out.extend_from_slice(&self.request_key);
        out.extend_from_slice(&self.name_key_id);
        put_u16_prefixed(
            &mut out,
            &self.encrypted_token_request,
            "encrypted token request",
        )?;
        out.extend_from_slice(&self.signature);
        Ok(out)
    }

    /// `u16 type ‖ request_key ‖ name_key_id ‖ u16-len encrypted_token_request`
    pub fn signed_message(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(
            2 + self.request_key.len() + NAME_KEY_ID_LEN + 2 + self.encrypted_token_request.len(),
        );
        out.extend_from_slice(&TokenType::RateLimited.tag().to_be_bytes());
        out.extend_from_slice(&self.request_key);
        out.extend_from_slice(&self.name_key_id);
        put_u16_prefixed(
            &mut out,
            &self.encrypted_token_request,
            "encrypted token request",
        )?;
        Ok(out)
    }

    /// Verify the ECDSA P-384 / SHA-384 signature under the embedded request key.
    pub fn verify_signature(&self) -> Result<()> {
        let key = VerifyingKey::from_sec1_bytes(&self.request_key)
            .map_err(|e| Error::InvalidKey(format!("request key: {e}")))?;
        let signature =
            Signature::from_slice(&self.signature).map_err(|_| Error::SignatureInvalid)?;
        key.verify(&self.signed_message()?, &signature)
            .map_err(|_| Error::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p384::ecdsa::SigningKey;
    use p384::ecdsa::signature::Signer;
    use rand_core::OsRng;

    fn signed_request(signing_key: &SigningKey) -> RateLimitedTokenRequest {
        let request_key = VerifyingKey::from(signing_key)
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        let mut request = RateLimitedTokenRequest {
            token_key_id: 0x2a,
            request_key,
            name_key_id: [9u8; NAME_KEY_ID_LEN],
            encrypted_token_request: b"sealed blinded message".to_vec(),
            signature: Vec::new(),
        };
        let signature: Signature = signing_key.sign(&request.signed_message().unwrap());
        request.signature = signature.to_bytes().to_vec();
        request
    }

    #[test]
    fn signed_message_excludes_token_key_id_and_signature() {
        let request = signed_request(&SigningKey::random(&mut OsRng));
        let message = request.signed_message().unwrap();
        assert_eq!(&message[..2], &[0x00, 0x03]);
        assert_eq!(&message[2..2 + REQUEST_KEY_LEN], request.request_key.as_slice());
        let prefix_at = 2 + REQUEST_KEY_LEN + NAME_KEY_ID_LEN;
        assert_eq!(&message[prefix_at..prefix_at + 2], &[0x00, 22]);
        assert_eq!(message.len(), prefix_at + 2 + 22);
    }

    #[test]
    fn unmarshal_recovers_marshalled_request() {
        let request = signed_request(&SigningKey::random(&mut OsRng));
        let encoded = request.marshal().unwrap();
        assert_eq!(RateLimitedTokenRequest::unmarshal(&encoded).unwrap(), request);
    }

    #[test]
    fn valid_signature_verifies() {
        let request = signed_request(&SigningKey::random(&mut OsRng));
        assert_eq!(request.verify_signature(), Ok(()));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let mut request = signed_request(&SigningKey::random(&mut OsRng));
        request.encrypted_token_request[0] ^= 0xff;
        assert_eq!(request.verify_signature(), Err(Error::SignatureInvalid));
    }

    #[test]
    fn signature_from_another_key_fails_verification() {
        let mut request = signed_request(&SigningKey::random(&mut OsRng));
        let other = signed_request(&SigningKey::random(&mut OsRng));
        request.signature = other.signature;
        assert_eq!(request.verify_signature(), Err(Error::SignatureInvalid));
    }

    #[test]
    fn garbage_request_key_is_invalid() {
        let mut request = signed_request(&SigningKey::random(&mut OsRng));
        request.request_key = vec![0x02; REQUEST_KEY_LEN];
        request.request_key[1] = 0xff;
        assert!(request.verify_signature().is_err());
    }

    #[test]
    fn basic_tag_is_not_a_rate_limited_request() {
        let request = signed_request(&SigningKey::random(&mut OsRng));
        let mut encoded = request.marshal().unwrap();
        encoded[1] = 0x02;
        assert!(RateLimitedTokenRequest::unmarshal(&encoded).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let request = signed_request(&SigningKey::random(&mut OsRng));
        let mut encoded = request.marshal().unwrap();
        encoded.push(0);
        assert_eq!(
            RateLimitedTokenRequest::unmarshal(&encoded),
            Err(Error::TrailingBytes("rate-limited token request"))
        );
    }

    #[test]
    fn empty_encrypted_request_is_rejected() {
        let mut request = signed_request(&SigningKey::random(&mut OsRng));
        request.encrypted_token_request.clear();
        let encoded = request.marshal().unwrap();
        assert_eq!(
            RateLimitedTokenRequest::unmarshal(&encoded),
            Err(Error::Malformed("encrypted token request"))
        );
    }
}
