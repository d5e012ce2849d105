//! Forwarding token requests to the Issuer
//!
//! Exactly one attempt per client request: no retries, bounded by the
//! configured timeout. Only the token request body and its content type are
//! sent; the client key, request blind and client id stay with the Attester.

use std::time::Duration;

use axum::http::HeaderMap;
use bytes::Bytes;
use privacypass::{TOKEN_REQUEST_MEDIA_TYPE, TOKEN_REQUEST_PATH};
use tracing::{debug, error, instrument};

use crate::error::{Error, Result};
use crate::metrics;

/// HTTP client for the Issuer's token request endpoint.
#[derive(Clone)]
pub struct IssuerClient {
    client: reqwest::Client,
    scheme: String,
    timeout: Duration,
}

/// A successful Issuer response.
#[derive(Debug)]
pub struct IssuerResponse {
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IssuerClient {
    pub fn new(client: reqwest::Client, scheme: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            scheme: scheme.into(),
            timeout,
        }
    }

    pub fn token_request_url(&self, issuer: &str) -> String {
        format!("{}://{}{}", self.scheme, issuer, TOKEN_REQUEST_PATH)
    }

    /// POST the client's token request to `issuer` once.
    #[instrument(skip_all, fields(issuer = %issuer))]
    pub async fn forward(&self, issuer: &str, body: Bytes) -> Result<IssuerResponse> {
        let url = self.token_request_url(issuer);
        debug!(url = %url, "forwarding token request");

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, TOKEN_REQUEST_MEDIA_TYPE)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let error_type = if e.is_timeout() { "timeout" } else { "connection" };
                metrics::record_issuer_error(error_type);
                error!(error = %e, error_type, "forwarded request failed");
                Error::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            metrics::record_issuer_error("status");
            error!(%status, "issuer rejected token request");
            return Err(Error::Upstream(format!("issuer returned {status}")));
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            metrics::record_issuer_error("body");
            error!(error = %e, "failed to read issuer response body");
            Error::Upstream(format!("issuer response read error: {e}"))
        })?;

        Ok(IssuerResponse { headers, body })
    }
}

/// Accept only `host` or `host:port` as an Issuer name.
///
/// The name is spliced into a URL, so anything that could change its path,
/// userinfo or query is refused.
pub fn is_valid_issuer_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}
