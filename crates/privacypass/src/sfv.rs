//! RFC 8941 byte-sequence header values (`:<base64>:`)

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::{Error, Result};

/// Standard alphabet; padding is optional when parsing.
const SF_BINARY: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Parse a structured-field byte sequence, e.g. `:AQID:`.
pub fn parse_binary(value: &str) -> Result<Vec<u8>> {
    let inner = value
        .trim()
        .strip_prefix(':')
        .and_then(|v| v.strip_suffix(':'))
        .ok_or_else(|| Error::StructuredHeader("byte sequence must be wrapped in ':'".into()))?;
    SF_BINARY
        .decode(inner)
        .map_err(|e| Error::StructuredHeader(format!("invalid base64: {e}")))
}

/// Serialize bytes as a structured-field byte sequence.
pub fn encode_binary(bytes: &[u8]) -> String {
    format!(":{}:", SF_BINARY.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_value() {
        assert_eq!(parse_binary(":AQID:").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_binary(":AQI=:").unwrap(), vec![1, 2]);
    }

    #[test]
    fn parses_unpadded_value_and_whitespace() {
        assert_eq!(parse_binary("  :AQI:  ").unwrap(), vec![1, 2]);
    }

    #[test]
    fn empty_sequence_is_empty_bytes() {
        assert_eq!(parse_binary("::").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn missing_colons_are_rejected() {
        assert!(matches!(
            parse_binary("AQID"),
            Err(Error::StructuredHeader(_))
        ));
        assert!(matches!(
            parse_binary(":AQID"),
            Err(Error::StructuredHeader(_))
        ));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(matches!(
            parse_binary(":!!!:"),
            Err(Error::StructuredHeader(_))
        ));
    }

    #[test]
    fn encode_wraps_padded_base64() {
        assert_eq!(encode_binary(&[1, 2]), ":AQI=:");
        assert_eq!(parse_binary(&encode_binary(&[0xde, 0xad])).unwrap(), vec![0xde, 0xad]);
    }
}
