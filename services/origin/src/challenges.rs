//! Outstanding challenges and the options clients use to shape them
//!
//! Challenges are queued per context (SHA-256 of the serialized challenge).
//! Non-interactive, cross-origin challenges of one token type all serialize
//! identically, so a context can hold many; redemption always takes the
//! oldest. Nothing expires.

use std::collections::{HashMap, VecDeque};

use axum::http::HeaderMap;
use privacypass::{
    ChallengeContext, HEADER_CHALLENGE_COUNT, HEADER_CROSS_ORIGIN, HEADER_NON_INTERACTIVE,
    HEADER_TOKEN_TYPE, TokenChallenge, TokenType,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Upper bound (inclusive) on challenges handed out in one response.
pub const MAX_CHALLENGE_COUNT: usize = 9;

/// Issued, unredeemed challenges.
#[derive(Default)]
pub struct ChallengeStore {
    pending: Mutex<HashMap<ChallengeContext, VecDeque<TokenChallenge>>>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a challenge under the context of its serialized form.
    pub async fn push(&self, challenge: TokenChallenge, encoded: &[u8]) -> ChallengeContext {
        let context = ChallengeContext::of(encoded);
        let mut pending = self.pending.lock().await;
        let queue = pending.entry(context).or_default();
        queue.push_back(challenge);
        debug!(%context, queued = queue.len(), "challenge added");
        context
    }

    /// Remove and return the oldest challenge for `context`.
    pub async fn pop(&self, context: &ChallengeContext) -> Option<TokenChallenge> {
        let mut pending = self.pending.lock().await;
        let queue = pending.get_mut(context)?;
        let challenge = queue.pop_front();
        let remaining = queue.len();
        if remaining == 0 {
            pending.remove(context);
        }
        debug!(%context, remaining, "challenge consumed");
        challenge
    }

    /// Total challenges waiting to be redeemed.
    pub async fn outstanding(&self) -> usize {
        self.pending.lock().await.values().map(VecDeque::len).sum()
    }
}

/// Query parameters that mirror the challenge attribute headers.
///
/// Built from raw key/value pairs; a repeated key keeps its first value.
#[derive(Debug, Default)]
pub struct ChallengeQuery {
    pub token_type: Option<String>,
    pub noninteractive: Option<String>,
    pub crossorigin: Option<String>,
}

impl FromIterator<(String, String)> for ChallengeQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "type" => &mut query.token_type,
                "noninteractive" => &mut query.noninteractive,
                "crossorigin" => &mut query.crossorigin,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

/// Shape of the challenges returned for one unauthenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeOptions {
    pub token_type: TokenType,
    pub interactive: bool,
    pub cross_origin: bool,
    pub count: usize,
}

impl ChallengeOptions {
    pub fn from_request(headers: &HeaderMap, query: &ChallengeQuery) -> Self {
        let flag = |header: &str, param: &Option<String>| {
            header_is_set(headers, header) || param.as_deref().is_some_and(|v| !v.is_empty())
        };
        Self {
            token_type: requested_token_type(
                header_str(headers, HEADER_TOKEN_TYPE),
                query.token_type.as_deref(),
            ),
            interactive: !flag(HEADER_NON_INTERACTIVE, &query.noninteractive),
            cross_origin: flag(HEADER_CROSS_ORIGIN, &query.crossorigin),
            count: challenge_count(header_str(headers, HEADER_CHALLENGE_COUNT)),
        }
    }
}

/// Rate-limited unless the header, or failing that the query, asks for Basic.
fn requested_token_type(header: Option<&str>, query: Option<&str>) -> TokenType {
    let parse = |v: &str| v.trim().parse::<u16>().ok();
    let requested = header.and_then(parse).or_else(|| query.and_then(parse));
    match requested {
        Some(TokenType::BASIC_TAG) => TokenType::Basic,
        _ => TokenType::RateLimited,
    }
}

fn challenge_count(header: Option<&str>) -> usize {
    header
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| (1..=MAX_CHALLENGE_COUNT).contains(n))
        .unwrap_or(1)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_is_set(headers: &HeaderMap, name: &str) -> bool {
    headers.get(name).is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn challenge(nonce: Vec<u8>) -> TokenChallenge {
        TokenChallenge {
            token_type: TokenType::RateLimited,
            issuer_name: "issuer.example".into(),
            redemption_nonce: nonce,
            origin_info: vec!["origin.example".into()],
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn pop_returns_pushed_challenge_once() {
        let store = ChallengeStore::new();
        let c = challenge(vec![1u8; 32]);
        let encoded = c.marshal().unwrap();
        let context = store.push(c.clone(), &encoded).await;

        assert_eq!(context, ChallengeContext::of(&encoded));
        assert_eq!(store.outstanding().await, 1);
        assert_eq!(store.pop(&context).await, Some(c));
        assert_eq!(store.pop(&context).await, None);
        assert_eq!(store.outstanding().await, 0);
    }

    #[tokio::test]
    async fn identical_challenges_are_consumed_oldest_first() {
        let store = ChallengeStore::new();
        let c = challenge(Vec::new());
        let encoded = c.marshal().unwrap();
        let context = store.push(c.clone(), &encoded).await;
        store.push(c.clone(), &encoded).await;
        store.push(c.clone(), &encoded).await;

        assert_eq!(store.outstanding().await, 3);
        for remaining in (0..3).rev() {
            assert!(store.pop(&context).await.is_some());
            assert_eq!(store.outstanding().await, remaining);
        }
        assert!(store.pop(&context).await.is_none());
    }

    #[tokio::test]
    async fn unknown_context_yields_nothing() {
        let store = ChallengeStore::new();
        store.push(challenge(vec![1u8; 32]), b"one").await;
        assert!(
            store
                .pop(&ChallengeContext::from_bytes([9u8; 32]))
                .await
                .is_none()
        );
        assert_eq!(store.outstanding().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pops_consume_each_challenge_once() {
        let store = Arc::new(ChallengeStore::new());
        let c = challenge(Vec::new());
        let encoded = c.marshal().unwrap();
        let mut context = None;
        for _ in 0..8 {
            context = Some(store.push(c.clone(), &encoded).await);
        }
        let context = context.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.pop(&context).await.is_some() })
            })
            .collect();
        let mut granted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                granted += 1;
            }
        }
        assert_eq!(granted, 8);
        assert_eq!(store.outstanding().await, 0);
    }

    #[test]
    fn defaults_to_one_interactive_rate_limited_challenge() {
        let options = ChallengeOptions::from_request(&HeaderMap::new(), &ChallengeQuery::default());
        assert_eq!(
            options,
            ChallengeOptions {
                token_type: TokenType::RateLimited,
                interactive: true,
                cross_origin: false,
                count: 1,
            }
        );
    }

    #[test]
    fn token_type_from_header_then_query() {
        assert_eq!(requested_token_type(Some("2"), None), TokenType::Basic);
        assert_eq!(requested_token_type(Some("3"), Some("2")), TokenType::RateLimited);
        assert_eq!(requested_token_type(Some("basic"), Some("2")), TokenType::Basic);
        assert_eq!(requested_token_type(None, Some("2")), TokenType::Basic);
        assert_eq!(requested_token_type(None, Some("7")), TokenType::RateLimited);
        assert_eq!(requested_token_type(None, None), TokenType::RateLimited);
    }

    #[test]
    fn attribute_headers_and_query_flags() {
        let options = ChallengeOptions::from_request(
            &headers(&[
                ("sec-token-attribute-non-interactive", "?1"),
                ("sec-token-attribute-cross-origin", "1"),
            ]),
            &ChallengeQuery::default(),
        );
        assert!(!options.interactive);
        assert!(options.cross_origin);

        let query = ChallengeQuery {
            token_type: Some("2".into()),
            noninteractive: Some("1".into()),
            crossorigin: Some(String::new()),
        };
        let options = ChallengeOptions::from_request(&HeaderMap::new(), &query);
        assert_eq!(options.token_type, TokenType::Basic);
        assert!(!options.interactive);
        assert!(!options.cross_origin, "empty query value does not set the flag");
    }

    #[test]
    fn repeated_query_keys_keep_first_value() {
        let pairs = [
            ("type", "2"),
            ("type", "3"),
            ("crossorigin", ""),
            ("crossorigin", "1"),
            ("utm_source", "feed"),
        ];
        let query: ChallengeQuery = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(query.token_type.as_deref(), Some("2"));
        assert_eq!(query.crossorigin.as_deref(), Some(""));
        assert!(query.noninteractive.is_none());

        let options = ChallengeOptions::from_request(&HeaderMap::new(), &query);
        assert_eq!(options.token_type, TokenType::Basic);
        assert!(!options.cross_origin);
    }

    #[test]
    fn count_is_bounded() {
        assert_eq!(challenge_count(None), 1);
        assert_eq!(challenge_count(Some("1")), 1);
        assert_eq!(challenge_count(Some("9")), 9);
        assert_eq!(challenge_count(Some("0")), 1);
        assert_eq!(challenge_count(Some("10")), 1);
        assert_eq!(challenge_count(Some("-3")), 1);
        assert_eq!(challenge_count(Some("three")), 1);
    }
}
