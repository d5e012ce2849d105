//! Anonymized per-(client, origin) index derivation
//!
//! The client blinds its long-term key with `request_blind` before the Issuer
//! mixes in the origin's secret. The Attester removes the blind and hashes the
//! result with the client key, giving a value that is stable for a given
//! (client, origin) pair while revealing neither the origin to the Attester
//! nor the client to the Issuer.

use hkdf::Hkdf;
use p384::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p384::elliptic_curve::{Field, PrimeField};
use p384::{AffinePoint, EncodedPoint, FieldBytes, ProjectivePoint, Scalar};
use sha2::Sha384;

use crate::error::{Error, Result};

/// Output length (SHA-384 digest size).
pub const INDEX_LEN: usize = 48;

const INDEX_INFO: &[u8] = b"anon_issuer_origin_id";

/// `HKDF-SHA384(salt = client_key, ikm = blind⁻¹ · blinded_origin_key)`
pub fn finalize_index(
    client_key: &[u8],
    request_blind: &[u8],
    blinded_origin_key: &[u8],
) -> Result<Vec<u8>> {
    let blinded = decode_point(blinded_origin_key)?;
    let blind = decode_scalar(request_blind)?;
    let unblind = Option::<Scalar>::from(<Scalar as Field>::invert(&blind))
        .ok_or_else(|| Error::Index("request blind is not invertible".into()))?;

    let unblinded = AffinePoint::from(ProjectivePoint::from(blinded) * unblind);
    let unblinded = unblinded.to_encoded_point(true);

    let hkdf = Hkdf::<Sha384>::new(Some(client_key), unblinded.as_bytes());
    let mut index = vec![0u8; INDEX_LEN];
    hkdf.expand(INDEX_INFO, &mut index)
        .map_err(|e| Error::Index(format!("hkdf expand: {e}")))?;
    Ok(index)
}

fn decode_point(bytes: &[u8]) -> Result<AffinePoint> {
    let encoded = EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::Index(format!("blinded origin key encoding: {e}")))?;
    Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::Index("blinded origin key is not on P-384".into()))
}

fn decode_scalar(bytes: &[u8]) -> Result<Scalar> {
    if bytes.len() != 48 {
        return Err(Error::Index(format!(
            "request blind must be 48 bytes, got {}",
            bytes.len()
        )));
    }
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::clone_from_slice(bytes)))
        .ok_or_else(|| Error::Index("request blind is out of range".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    /// Issuer side of the exchange, for fixtures only.
    fn issuer_blinded_key(client_point: ProjectivePoint, blind: Scalar, origin_secret: Scalar) -> Vec<u8> {
        let request_key = client_point * blind;
        AffinePoint::from(request_key * origin_secret)
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    fn client_key(point: ProjectivePoint) -> Vec<u8> {
        AffinePoint::from(point).to_encoded_point(true).as_bytes().to_vec()
    }

    #[test]
    fn index_is_stable_across_fresh_blinds() {
        let client_secret = Scalar::random(&mut OsRng);
        let client_point = ProjectivePoint::GENERATOR * client_secret;
        let origin_secret = Scalar::random(&mut OsRng);

        let blind_a = Scalar::random(&mut OsRng);
        let blind_b = Scalar::random(&mut OsRng);
        let index_a = finalize_index(
            &client_key(client_point),
            &blind_a.to_repr(),
            &issuer_blinded_key(client_point, blind_a, origin_secret),
        )
        .unwrap();
        let index_b = finalize_index(
            &client_key(client_point),
            &blind_b.to_repr(),
            &issuer_blinded_key(client_point, blind_b, origin_secret),
        )
        .unwrap();

        assert_eq!(index_a.len(), INDEX_LEN);
        assert_eq!(index_a, index_b);
    }

    #[test]
    fn different_origins_give_different_indices() {
        let client_point = ProjectivePoint::GENERATOR * Scalar::random(&mut OsRng);
        let blind = Scalar::random(&mut OsRng);

        let a = finalize_index(
            &client_key(client_point),
            &blind.to_repr(),
            &issuer_blinded_key(client_point, blind, Scalar::random(&mut OsRng)),
        )
        .unwrap();
        let b = finalize_index(
            &client_key(client_point),
            &blind.to_repr(),
            &issuer_blinded_key(client_point, blind, Scalar::random(&mut OsRng)),
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn zero_blind_is_rejected() {
        let point = client_key(ProjectivePoint::GENERATOR);
        let err = finalize_index(&point, &[0u8; 48], &point).unwrap_err();
        assert!(matches!(err, Error::Index(_)));
    }

    #[test]
    fn short_blind_is_rejected() {
        let point = client_key(ProjectivePoint::GENERATOR);
        assert!(finalize_index(&point, &[1u8; 16], &point).is_err());
    }

    #[test]
    fn malformed_origin_key_is_rejected() {
        let blind = Scalar::random(&mut OsRng);
        assert!(finalize_index(b"client", &blind.to_repr(), &[0x05; 49]).is_err());
    }
}
