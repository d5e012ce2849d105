//! Issuer token keys and authenticator verification
//!
//! Issuers publish RSA public keys as SPKI DER, usually with the
//! `id-RSASSA-PSS` algorithm identifier that the generic SPKI decoder refuses,
//! so the key is lifted out of the SPKI wrapper by hand and decoded as PKCS#1.
//! Bare PKCS#1 keys are accepted as well.

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use rsa::{Pss, RsaPublicKey};
use sha2::{Digest, Sha384};

use crate::error::{Error, Result};

/// RSASSA-PSS salt length (SHA-384 output size).
pub const PSS_SALT_LEN: usize = 48;

/// An Issuer public key together with its original encoding.
///
/// The encoding is what the Origin advertises in `token-key=`; the parsed
/// key is what it verifies with.
#[derive(Debug, Clone)]
pub struct TokenKey {
    encoded: Vec<u8>,
    key: RsaPublicKey,
}

impl TokenKey {
    pub fn from_der(encoded: Vec<u8>) -> Result<Self> {
        let key = parse_rsa_public_key(&encoded)?;
        Ok(Self { encoded, key })
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// RSASSA-PSS / SHA-384 verification of `authenticator` over `message`.
    pub fn verify(&self, message: &[u8], authenticator: &[u8]) -> Result<()> {
        let digest = Sha384::digest(message);
        self.key
            .verify(
                Pss::new_with_salt::<Sha384>(PSS_SALT_LEN),
                &digest,
                authenticator,
            )
            .map_err(|_| Error::SignatureInvalid)
    }
}

fn parse_rsa_public_key(der: &[u8]) -> Result<RsaPublicKey> {
    if let Ok(spki) = SubjectPublicKeyInfoRef::try_from(der) {
        let pkcs1 = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| Error::InvalidKey("SPKI key bits are not byte aligned".into()))?;
        return RsaPublicKey::from_pkcs1_der(pkcs1)
            .map_err(|e| Error::InvalidKey(format!("SPKI does not wrap an RSA key: {e}")));
    }
    RsaPublicKey::from_pkcs1_der(der)
        .map_err(|e| Error::InvalidKey(format!("not an SPKI or PKCS#1 RSA key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::EncodePublicKey;
    use std::sync::OnceLock;

    /// Key generation is slow in debug builds; share one key across tests.
    fn private_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
    }

    fn sign(message: &[u8]) -> Vec<u8> {
        let digest = Sha384::digest(message);
        private_key()
            .sign_with_rng(
                &mut OsRng,
                Pss::new_with_salt::<Sha384>(PSS_SALT_LEN),
                &digest,
            )
            .unwrap()
    }

    fn spki_der() -> Vec<u8> {
        private_key()
            .to_public_key()
            .to_public_key_der()
            .unwrap()
            .as_bytes()
            .to_vec()
    }

    #[test]
    fn parses_spki_and_keeps_encoding() {
        let der = spki_der();
        let key = TokenKey::from_der(der.clone()).unwrap();
        assert_eq!(key.encoded(), der.as_slice());
    }

    #[test]
    fn parses_bare_pkcs1() {
        let der = private_key()
            .to_public_key()
            .to_pkcs1_der()
            .unwrap()
            .as_bytes()
            .to_vec();
        assert!(TokenKey::from_der(der).is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            TokenKey::from_der(b"not a key".to_vec()),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn verifies_pss_signature() {
        let key = TokenKey::from_der(spki_der()).unwrap();
        let message = b"authenticator input";
        assert_eq!(key.verify(message, &sign(message)), Ok(()));
    }

    #[test]
    fn rejects_signature_over_other_message() {
        let key = TokenKey::from_der(spki_der()).unwrap();
        let signature = sign(b"authenticator input");
        assert_eq!(
            key.verify(b"different input", &signature),
            Err(Error::SignatureInvalid)
        );
    }

    #[test]
    fn rejects_truncated_signature() {
        let key = TokenKey::from_der(spki_der()).unwrap();
        let mut signature = sign(b"authenticator input");
        signature.truncate(10);
        assert_eq!(
            key.verify(b"authenticator input", &signature),
            Err(Error::SignatureInvalid)
        );
    }
}
