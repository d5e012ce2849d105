//! Issuer directory bootstrap
//!
//! Fetched once at startup. The Origin needs the public key for each token
//! type it challenges with, plus the Issuer's encapsulation key, which it
//! only relays to clients.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::Engine;
use privacypass::{ISSUER_DIRECTORY_PATH, TokenKey, TokenType};
use serde::Deserialize;
use tracing::{info, warn};

use crate::origin::BASE64_URL;

#[derive(Debug, Deserialize)]
struct IssuerDirectory {
    #[serde(rename = "issuer-encap-key-uri")]
    encap_key_uri: String,
    #[serde(rename = "token-keys", default)]
    token_keys: Vec<DirectoryKey>,
}

#[derive(Debug, Deserialize)]
struct DirectoryKey {
    #[serde(rename = "token-type")]
    token_type: u16,
    #[serde(rename = "token-key")]
    token_key: String,
}

/// Issuer keys the Origin challenges and verifies with.
#[derive(Debug)]
pub struct IssuerKeys {
    pub basic: TokenKey,
    pub rate_limited: TokenKey,
    /// Advertised verbatim as `issuer-encap-key=`.
    pub encap_key: Vec<u8>,
}

impl IssuerKeys {
    pub fn for_type(&self, token_type: TokenType) -> &TokenKey {
        match token_type {
            TokenType::Basic => &self.basic,
            TokenType::RateLimited => &self.rate_limited,
        }
    }

    /// Fetch the directory at `<base_url>/.well-known/token-issuer-directory`
    /// and the encapsulation key it points to.
    pub async fn fetch(client: &reqwest::Client, base_url: &str, timeout: Duration) -> Result<Self> {
        let directory_url = format!("{base_url}{ISSUER_DIRECTORY_PATH}");
        info!(url = %directory_url, "fetching issuer directory");
        let body = get_bytes(client, &directory_url, timeout).await?;
        let directory: IssuerDirectory =
            serde_json::from_slice(&body).context("issuer directory is not valid JSON")?;

        let encap_key_url = resolve_uri(base_url, &directory.encap_key_uri);
        info!(url = %encap_key_url, "fetching issuer encapsulation key");
        let encap_key = get_bytes(client, &encap_key_url, timeout).await?;
        if encap_key.is_empty() {
            bail!("issuer encapsulation key at {encap_key_url} is empty");
        }

        Self::from_directory(directory, encap_key)
    }

    fn from_directory(directory: IssuerDirectory, encap_key: Vec<u8>) -> Result<Self> {
        let mut basic = None;
        let mut rate_limited = None;
        for entry in directory.token_keys {
            let Ok(token_type) = TokenType::try_from(entry.token_type) else {
                warn!(token_type = entry.token_type, "ignoring key for unsupported token type");
                continue;
            };
            let der = BASE64_URL
                .decode(entry.token_key.trim())
                .with_context(|| format!("{} token key is not base64url", token_type.label()))?;
            let key = TokenKey::from_der(der)
                .with_context(|| format!("{} token key is not an RSA key", token_type.label()))?;
            match token_type {
                TokenType::Basic => basic = Some(key),
                TokenType::RateLimited => rate_limited = Some(key),
            }
        }

        Ok(Self {
            basic: basic.context("issuer directory has no basic token key")?,
            rate_limited: rate_limited.context("issuer directory has no rate-limited token key")?,
            encap_key,
        })
    }
}

/// Relative URIs are resolved against the Issuer's base URL.
fn resolve_uri(base_url: &str, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        uri.to_string()
    } else if uri.starts_with('/') {
        format!("{base_url}{uri}")
    } else {
        format!("{base_url}/{uri}")
    }
}

async fn get_bytes(client: &reqwest::Client, url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("GET {url} returned {status}");
    }
    let body = response
        .bytes()
        .await
        .with_context(|| format!("failed to read body of {url}"))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::EncodePublicKey;

    fn spki_b64() -> String {
        let key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let der = key.to_public_key().to_public_key_der().unwrap();
        BASE64_URL.encode(der.as_bytes())
    }

    fn directory(keys: &[(u16, String)]) -> IssuerDirectory {
        IssuerDirectory {
            encap_key_uri: "/encap-key".into(),
            token_keys: keys
                .iter()
                .map(|(t, k)| DirectoryKey {
                    token_type: *t,
                    token_key: k.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn directory_json_uses_hyphenated_fields() {
        let json = r#"{
            "issuer-request-uri": "/token-request",
            "issuer-encap-key-uri": "/encap-key",
            "token-keys": [{"token-type": 2, "token-key": "AAAA"}]
        }"#;
        let parsed: IssuerDirectory = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.encap_key_uri, "/encap-key");
        assert_eq!(parsed.token_keys.len(), 1);
        assert_eq!(parsed.token_keys[0].token_type, 2);
    }

    #[test]
    fn both_token_types_are_required() {
        let key = spki_b64();
        let only_basic = IssuerKeys::from_directory(directory(&[(2, key.clone())]), vec![1]);
        let err = only_basic.unwrap_err().to_string();
        assert!(err.contains("rate-limited"), "got: {err}");

        let both = IssuerKeys::from_directory(directory(&[(2, key.clone()), (3, key)]), vec![1]);
        assert!(both.is_ok());
    }

    #[test]
    fn unsupported_token_types_are_skipped() {
        let key = spki_b64();
        let keys = IssuerKeys::from_directory(
            directory(&[(1, "garbage".into()), (2, key.clone()), (3, key)]),
            vec![1],
        )
        .unwrap();
        assert_eq!(keys.for_type(TokenType::Basic).encoded(), keys.basic.encoded());
    }

    #[test]
    fn undecodable_key_is_an_error() {
        let result = IssuerKeys::from_directory(directory(&[(3, "!!!".into())]), vec![1]);
        assert!(result.is_err());
    }

    #[test]
    fn encap_key_uri_resolution() {
        assert_eq!(
            resolve_uri("https://issuer.example", "/encap-key"),
            "https://issuer.example/encap-key"
        );
        assert_eq!(
            resolve_uri("https://issuer.example", "encap-key"),
            "https://issuer.example/encap-key"
        );
        assert_eq!(
            resolve_uri("https://issuer.example", "https://keys.example/k"),
            "https://keys.example/k"
        );
    }
}
