//! Challenge issuance and token redemption

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use bytes::Bytes;
use privacypass::{NONCE_LEN, PRIVATE_TOKEN_SCHEME, Token, TokenChallenge, TokenType};
use rand::RngExt;
use tracing::{debug, error, info, instrument};

use crate::challenges::{ChallengeOptions, ChallengeStore};
use crate::directory::IssuerKeys;
use crate::error::{Error, Result};
use crate::metrics;

/// URL-safe base64, padded on output, padding optional on input.
pub(crate) const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// `max-age` attribute of every challenge, in seconds.
const CHALLENGE_MAX_AGE_SECS: u64 = 10;

#[derive(Clone)]
pub struct Origin {
    issuer_name: String,
    origin_info: Arc<[String]>,
    keys: Arc<IssuerKeys>,
    pub challenges: Arc<ChallengeStore>,
    resource: ResourceClient,
}

/// Fetches the protected resource after a successful redemption.
#[derive(Clone)]
pub struct ResourceClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ResourceClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Single GET of the configured resource.
    pub async fn fetch(&self) -> Result<Bytes> {
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                metrics::record_resource_error();
                error!(url = %self.url, error = %e, "resource fetch failed");
                Error::Resource(e.to_string())
            })?;
        let status = response.status();
        if !status.is_success() {
            metrics::record_resource_error();
            error!(url = %self.url, %status, "resource fetch returned error status");
            return Err(Error::Resource(format!("resource returned {status}")));
        }
        response.bytes().await.map_err(|e| {
            metrics::record_resource_error();
            Error::Resource(format!("resource read error: {e}"))
        })
    }
}

impl Origin {
    /// `origin_info` is the Origin's own name followed by any extra names.
    ///
    /// Fails when the names cannot fit in a serialized challenge.
    pub fn new(
        issuer_name: impl Into<String>,
        origin_info: Vec<String>,
        keys: IssuerKeys,
        resource: ResourceClient,
    ) -> privacypass::Result<Self> {
        let origin = Self {
            issuer_name: issuer_name.into(),
            origin_info: origin_info.into(),
            keys: Arc::new(keys),
            challenges: Arc::new(ChallengeStore::new()),
            resource,
        };
        origin
            .build_challenge(TokenType::RateLimited, true, false)
            .marshal()?;
        Ok(origin)
    }

    /// Issue `options.count` challenges and render the `WWW-Authenticate`
    /// value listing them.
    pub async fn challenge(&self, options: ChallengeOptions) -> privacypass::Result<String> {
        let token_key = BASE64_URL.encode(self.keys.for_type(options.token_type).encoded());
        let encap_key = BASE64_URL.encode(&self.keys.encap_key);

        let mut entries = Vec::with_capacity(options.count);
        for _ in 0..options.count {
            let challenge =
                self.build_challenge(options.token_type, options.interactive, options.cross_origin);
            let encoded = challenge.marshal()?;
            let interactive = challenge.is_interactive();
            let cross_origin = challenge.is_cross_origin();
            let context = self.challenges.push(challenge, &encoded).await;
            metrics::record_challenge(options.token_type.label());
            debug!(
                %context,
                token_type = options.token_type.label(),
                interactive,
                cross_origin,
                "challenge issued"
            );

            entries.push(format!(
                "{PRIVATE_TOKEN_SCHEME} challenge={}, token-key={token_key}, issuer-encap-key={encap_key}, max-age={CHALLENGE_MAX_AGE_SECS}",
                BASE64_URL.encode(&encoded),
            ));
        }
        Ok(entries.join(", "))
    }

    fn build_challenge(
        &self,
        token_type: TokenType,
        interactive: bool,
        cross_origin: bool,
    ) -> TokenChallenge {
        let redemption_nonce = if interactive {
            let mut nonce = [0u8; NONCE_LEN];
            rand::rng().fill(&mut nonce);
            nonce.to_vec()
        } else {
            Vec::new()
        };
        let origin_info = if cross_origin {
            Vec::new()
        } else {
            self.origin_info.to_vec()
        };
        TokenChallenge {
            token_type,
            issuer_name: self.issuer_name.clone(),
            redemption_nonce,
            origin_info,
        }
    }

    /// Redeem the token in an `Authorization` header value and return the
    /// protected resource.
    ///
    /// The matching challenge is consumed before verification, so a token
    /// that fails to verify cannot be retried against it.
    #[instrument(skip_all)]
    pub async fn redeem(&self, authorization: &str) -> Result<Bytes> {
        let encoded = token_param(authorization)?;
        let raw = BASE64_URL
            .decode(encoded)
            .map_err(|e| Error::InvalidAuthorization(format!("token is not base64url: {e}")))?;
        let token = Token::unmarshal(&raw)?;

        let challenge = self
            .challenges
            .pop(&token.context)
            .await
            .ok_or(Error::UnknownChallenge(token.context))?;

        self.keys
            .for_type(challenge.token_type)
            .verify(&token.authenticator_input(), &token.authenticator)?;
        info!(
            context = %token.context,
            token_type = challenge.token_type.label(),
            "token redeemed"
        );

        self.resource.fetch().await
    }
}

/// Extract the value of `PrivateToken token=<value>`.
fn token_param(authorization: &str) -> Result<&str> {
    authorization
        .trim()
        .strip_prefix(PRIVATE_TOKEN_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("token="))
        .map(|value| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            Error::InvalidAuthorization(format!("expected '{PRIVATE_TOKEN_SCHEME} token=<token>'"))
        })
}
