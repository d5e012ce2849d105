//! Token request handling: validation, forwarding and quota enforcement
//!
//! Basic requests are proxied untouched. Rate-limited requests are checked in
//! this order, and the first failure ends the request:
//! 1. attester headers present and well formed
//! 2. request body decodes and its signature verifies (never forwarded otherwise)
//! 3. single forward to the Issuer
//! 4. Issuer response carries a numeric limit and the blinded origin key
//! 5. anonymized index derived and admitted by the quota ledger

use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;
use issuance_quota::QuotaLedger;
use privacypass::{
    DEFAULT_CLIENT_ID, HEADER_CLIENT_ID, HEADER_CLIENT_KEY, HEADER_REQUEST_BLIND,
    HEADER_TOKEN_LIMIT, HEADER_TOKEN_ORIGIN, RateLimitedTokenRequest, TOKEN_REQUEST_MEDIA_TYPE,
    TokenType, finalize_index, sfv,
};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::forward::{IssuerClient, is_valid_issuer_name};

/// Shared Attester state: the Issuer client and the quota ledger.
#[derive(Clone)]
pub struct Attester {
    pub issuer: IssuerClient,
    pub ledger: Arc<QuotaLedger>,
}

/// Blind signature to hand back to the client.
#[derive(Debug)]
pub struct Issued {
    pub token_type: TokenType,
    pub blind_signature: Bytes,
}

/// Attester-only headers of a rate-limited request.
struct RateLimitHeaders {
    anonymized_origin: Vec<u8>,
    client_key: Vec<u8>,
    request_blind: Vec<u8>,
    client_id: String,
}

impl Attester {
    pub fn new(issuer: IssuerClient, ledger: Arc<QuotaLedger>) -> Self {
        Self { issuer, ledger }
    }

    /// Handle one `POST /token-request?issuer=<name>`.
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        issuer: Option<&str>,
        body: Bytes,
    ) -> Result<Issued> {
        require_content_type(headers)?;
        let issuer = match issuer {
            Some(name) if is_valid_issuer_name(name) => name,
            Some(name) => {
                return Err(Error::InvalidRequest(format!("invalid issuer name: {name}")));
            }
            None => return Err(Error::InvalidRequest("issuer query parameter missing".into())),
        };

        match TokenType::peek(&body)? {
            TokenType::Basic => self.handle_basic(issuer, body).await,
            TokenType::RateLimited => self.handle_rate_limited(headers, issuer, body).await,
        }
    }

    async fn handle_basic(&self, issuer: &str, body: Bytes) -> Result<Issued> {
        let response = self.issuer.forward(issuer, body).await?;
        debug!(issuer, bytes = response.body.len(), "basic token response relayed");
        Ok(Issued {
            token_type: TokenType::Basic,
            blind_signature: response.body,
        })
    }

    async fn handle_rate_limited(
        &self,
        headers: &HeaderMap,
        issuer: &str,
        body: Bytes,
    ) -> Result<Issued> {
        let attester_headers = RateLimitHeaders::parse(headers)?;

        let request = RateLimitedTokenRequest::unmarshal(&body)?;
        if let Err(e) = request.verify_signature() {
            warn!(client_id = %attester_headers.client_id, error = %e, "request signature failed to verify");
            return Err(e.into());
        }

        let response = self.issuer.forward(issuer, body).await?;
        let limit = token_limit(&response.headers)?;
        let blinded_origin_key = header_binary(&response.headers, HEADER_TOKEN_ORIGIN)
            .map_err(|e| Error::IssuerResponse(e.to_string()))?;

        let index = finalize_index(
            &attester_headers.client_key,
            &attester_headers.request_blind,
            &blinded_origin_key,
        )?;

        let admission = self
            .ledger
            .admit(
                &attester_headers.client_id,
                &attester_headers.anonymized_origin,
                &index,
                limit,
            )
            .await?;
        info!(
            client_id = %attester_headers.client_id,
            count = admission.count,
            limit,
            new_binding = admission.new_binding,
            "rate-limited token issued"
        );

        Ok(Issued {
            token_type: TokenType::RateLimited,
            blind_signature: response.body,
        })
    }
}

impl RateLimitHeaders {
    fn parse(headers: &HeaderMap) -> Result<Self> {
        let anonymized_origin = header_binary(headers, HEADER_TOKEN_ORIGIN)?;
        let client_key = header_binary(headers, HEADER_CLIENT_KEY)?;
        let request_blind = header_binary(headers, HEADER_REQUEST_BLIND)?;
        let client_id = client_id(headers)?;
        Ok(Self {
            anonymized_origin,
            client_key,
            request_blind,
            client_id,
        })
    }
}

fn require_content_type(headers: &HeaderMap) -> Result<()> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if content_type == Some(TOKEN_REQUEST_MEDIA_TYPE) {
        Ok(())
    } else {
        Err(Error::InvalidRequest("invalid Content-Type".into()))
    }
}

/// Required sf-binary header.
fn header_binary(headers: &HeaderMap, name: &str) -> Result<Vec<u8>> {
    let value = headers
        .get(name)
        .ok_or_else(|| Error::InvalidRequest(format!("header {name} missing")))?
        .to_str()
        .map_err(|_| Error::InvalidRequest(format!("header {name} is not ASCII")))?;
    sfv::parse_binary(value).map_err(|e| Error::InvalidRequest(format!("header {name}: {e}")))
}

/// `sec-client-id`, falling back to the shared default id.
fn client_id(headers: &HeaderMap) -> Result<String> {
    match headers.get(HEADER_CLIENT_ID) {
        None => Ok(DEFAULT_CLIENT_ID.to_string()),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| Error::InvalidRequest(format!("header {HEADER_CLIENT_ID} is not ASCII")))?;
            if value.is_empty() {
                Ok(DEFAULT_CLIENT_ID.to_string())
            } else {
                Ok(value.to_string())
            }
        }
    }
}

/// Numeric `sec-token-limit` from the Issuer response.
fn token_limit(headers: &HeaderMap) -> Result<u64> {
    let value = headers.get(HEADER_TOKEN_LIMIT).ok_or_else(|| {
        Error::IssuerResponse(format!("response missing {HEADER_TOKEN_LIMIT} header"))
    })?;
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| Error::IssuerResponse(format!("invalid {HEADER_TOKEN_LIMIT} header")))
}
