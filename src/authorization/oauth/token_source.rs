//! OAuth token cache with per-key request coalescing.
//!
//! # Responsibilities
//! - Cache bearer tokens per (client id, token URL)
//! - Allow at most one token request in flight per key
//! - Hand one fetch result (success or failure) to every concurrent waiter
//! - Invalidate all tokens of a client id on demand
//!
//! # Design Decisions
//! - One shared pending future per key instead of a coarse lock, so unrelated
//!   services never wait on each other's token fetches
//! - Failures are never cached
//! - Lock order is always `in_flight` before `tokens`
//! - Invalidation detaches in-flight fetches: their result still reaches the
//!   current waiters but is not stored

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::authorization::oauth::endpoint::{TokenEndpoint, TokenError, TokenResponse};
use crate::observability::metrics;

/// Tokens are considered expired this long before the endpoint says so.
const EXPIRY_MARGIN: Duration = Duration::from_secs(5);

type TokenFuture = Shared<BoxFuture<'static, Result<String, TokenError>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TokenKey {
    client_id: String,
    token_url: String,
}

impl TokenKey {
    fn new(client_id: &str, token_url: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            token_url: token_url.to_string(),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn from_response(response: &TokenResponse, now: Instant) -> Self {
        Self {
            token: response.access_token.clone(),
            // a lifetime past what Instant can represent never expires
            expires_at: response.expires_in.and_then(|secs| {
                now.checked_add(Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN))
            }),
        }
    }

    fn is_valid(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

struct InFlight {
    generation: u64,
    future: TokenFuture,
}

struct Inner {
    endpoint: Arc<dyn TokenEndpoint>,
    tokens: DashMap<TokenKey, CachedToken>,
    in_flight: DashMap<TokenKey, InFlight>,
    generation: AtomicU64,
}

/// Shared, cloneable token cache in front of a [`TokenEndpoint`].
#[derive(Clone)]
pub struct OAuthTokenSource {
    inner: Arc<Inner>,
}

impl fmt::Debug for OAuthTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenSource")
            .field("cached", &self.inner.tokens.len())
            .field("in_flight", &self.inner.in_flight.len())
            .finish()
    }
}

impl OAuthTokenSource {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint,
                tokens: DashMap::new(),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Return a valid token for the credentials, fetching one if needed.
    pub async fn get_token(
        &self,
        client_id: &str,
        client_secret: &str,
        token_url: &str,
    ) -> Result<String, TokenError> {
        let key = TokenKey::new(client_id, token_url);

        if let Some(token) = self.inner.cached(&key) {
            return Ok(token);
        }

        let flight = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(client_id = %client_id, "Joining in-flight token request");
                entry.get().future.clone()
            }
            Entry::Vacant(entry) => {
                // A fetch may have completed between the first check and taking the entry.
                if let Some(token) = self.inner.cached(&key) {
                    return Ok(token);
                }
                let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
                let future = Inner::fetch(
                    self.inner.clone(),
                    key,
                    client_secret.to_string(),
                    generation,
                )
                .boxed()
                .shared();
                entry.insert(InFlight {
                    generation,
                    future: future.clone(),
                });
                future
            }
        };

        flight.await
    }

    /// Drop every cached token of `client_id` and detach its in-flight fetches.
    pub fn invalidate(&self, client_id: &str) {
        self.inner
            .in_flight
            .retain(|key, _| key.client_id != client_id);
        self.inner.tokens.retain(|key, _| key.client_id != client_id);
        tracing::debug!(client_id = %client_id, "OAuth token cache invalidated");
    }

    /// Number of cached tokens, expired ones included.
    #[cfg(test)]
    fn cached_tokens(&self) -> usize {
        self.inner.tokens.len()
    }
}

impl Inner {
    fn cached(&self, key: &TokenKey) -> Option<String> {
        let entry = self.tokens.get(key)?;
        entry.is_valid(Instant::now()).then(|| entry.token.clone())
    }

    async fn fetch(
        self: Arc<Self>,
        key: TokenKey,
        client_secret: String,
        generation: u64,
    ) -> Result<String, TokenError> {
        tracing::debug!(
            client_id = %key.client_id,
            token_url = %key.token_url,
            "Requesting OAuth token"
        );

        let result = self
            .endpoint
            .request_token(&key.client_id, &client_secret, &key.token_url)
            .await;
        metrics::record_token_fetch(result.is_ok());

        if let Entry::Occupied(entry) = self.in_flight.entry(key.clone()) {
            if entry.get().generation == generation {
                if let Ok(response) = &result {
                    self.tokens
                        .insert(key.clone(), CachedToken::from_response(response, Instant::now()));
                }
                entry.remove();
            }
        }

        match result {
            Ok(response) => Ok(response.access_token),
            Err(e) => {
                tracing::warn!(client_id = %key.client_id, error = %e, "OAuth token request failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Counts calls and answers `token<n>` after an optional delay.
    pub(crate) struct MockTokenEndpoint {
        pub calls: AtomicUsize,
        pub delay: Duration,
        pub fail_first: usize,
        pub expires_in: Option<u64>,
    }

    impl MockTokenEndpoint {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
                fail_first: 0,
                expires_in: None,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenEndpoint for MockTokenEndpoint {
        async fn request_token(
            &self,
            _client_id: &str,
            _client_secret: &str,
            token_url: &str,
        ) -> Result<TokenResponse, TokenError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if n <= self.fail_first {
                return Err(TokenError::Status {
                    url: token_url.to_string(),
                    status: 500,
                });
            }
            Ok(TokenResponse {
                access_token: format!("token{}", n),
                token_type: Some("bearer".into()),
                expires_in: self.expires_in,
            })
        }
    }

    fn source(endpoint: MockTokenEndpoint) -> (OAuthTokenSource, Arc<MockTokenEndpoint>) {
        let endpoint = Arc::new(endpoint);
        (OAuthTokenSource::new(endpoint.clone()), endpoint)
    }

    #[tokio::test]
    async fn test_token_is_cached() {
        let (tokens, endpoint) = source(MockTokenEndpoint::new());

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token1");
        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token1");
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(tokens.cached_tokens(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let mut mock = MockTokenEndpoint::new();
        mock.delay = Duration::from_millis(100);
        let (tokens, endpoint) = source(mock);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let tokens = tokens.clone();
            handles.push(tokio::spawn(async move {
                tokens.get_token("abc", "xyz", "https://auth/token").await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "token1");
        }
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let mut mock = MockTokenEndpoint::new();
        mock.delay = Duration::from_millis(100);
        mock.fail_first = 1;
        let (tokens, endpoint) = source(mock);

        let mut handles = Vec::new();
        for _ in 0..5 {
            let tokens = tokens.clone();
            handles.push(tokio::spawn(async move {
                tokens.get_token("abc", "xyz", "https://auth/token").await
            }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, TokenError::Status { status: 500, .. }));
        }
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(tokens.cached_tokens(), 0);

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_fetch_independently() {
        let (tokens, endpoint) = source(MockTokenEndpoint::new());

        tokens.get_token("abc", "xyz", "https://auth/a").await.unwrap();
        tokens.get_token("abc", "xyz", "https://auth/b").await.unwrap();
        tokens.get_token("other", "xyz", "https://auth/a").await.unwrap();
        assert_eq!(endpoint.calls(), 3);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (tokens, endpoint) = source(MockTokenEndpoint::new());

        tokens.get_token("abc", "xyz", "https://auth/a").await.unwrap();
        tokens.get_token("abc", "xyz", "https://auth/b").await.unwrap();
        tokens.get_token("other", "xyz", "https://auth/a").await.unwrap();

        tokens.invalidate("abc");
        assert_eq!(tokens.cached_tokens(), 1);

        // untouched client keeps its token
        assert_eq!(tokens.get_token("other", "xyz", "https://auth/a").await.unwrap(), "token3");
        assert_eq!(endpoint.calls(), 3);

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/a").await.unwrap(), "token4");
        assert_eq!(endpoint.calls(), 4);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_client_is_noop() {
        let (tokens, _) = source(MockTokenEndpoint::new());
        tokens.invalidate("nobody");
        assert_eq!(tokens.cached_tokens(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_detaches_in_flight_fetch() {
        let mut mock = MockTokenEndpoint::new();
        mock.delay = Duration::from_millis(100);
        let (tokens, endpoint) = source(mock);

        let pending = {
            let tokens = tokens.clone();
            tokio::spawn(async move { tokens.get_token("abc", "xyz", "https://auth/token").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokens.invalidate("abc");

        // the waiter still gets its answer, but it is not kept
        assert_eq!(pending.await.unwrap().unwrap(), "token1");
        assert_eq!(tokens.cached_tokens(), 0);

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_token_is_refetched() {
        let mut mock = MockTokenEndpoint::new();
        mock.expires_in = Some(1); // below the expiry margin
        let (tokens, endpoint) = source(mock);

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token1");
        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token2");
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_long_lived_token_is_reused() {
        let mut mock = MockTokenEndpoint::new();
        mock.expires_in = Some(3600);
        let (tokens, endpoint) = source(mock);

        tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap();
        tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap();
        assert_eq!(endpoint.calls(), 1);
    }

    #[tokio::test]
    async fn test_unrepresentable_lifetime_never_expires() {
        let mut mock = MockTokenEndpoint::new();
        mock.expires_in = Some(u64::MAX);
        let (tokens, endpoint) = source(mock);

        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token1");
        assert_eq!(tokens.get_token("abc", "xyz", "https://auth/token").await.unwrap(), "token1");
        assert_eq!(endpoint.calls(), 1);
        assert!(tokens.inner.in_flight.is_empty());
    }
}
