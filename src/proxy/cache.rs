//! Per-service cache of forwarding targets.
//!
//! # Responsibilities
//! - Hold one entry per service ID: target URL, transport, authorization strategy
//! - Treat entries older than the TTL as absent
//! - Periodically sweep expired entries until shutdown
//!
//! # Design Decisions
//! - Entries are immutable and shared as `Arc`; replacing one never disturbs
//!   requests still holding the old entry
//! - Last write wins; racing rebuilds of one service are accepted
//! - One pooled transport is shared by every entry

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;
use url::Url;

use crate::authorization::AuthorizationStrategy;
use crate::observability::metrics;
use crate::proxy::error::ProxyError;

/// Everything needed to forward a request to one service.
#[derive(Debug)]
pub struct CacheEntry {
    pub service_id: String,
    pub target_url: Url,
    pub transport: reqwest::Client,
    pub authorization: Arc<AuthorizationStrategy>,
    pub created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created_at) >= ttl
    }
}

/// A thread-safe, TTL-bounded map of service ID to [`CacheEntry`].
#[derive(Debug, Clone)]
pub struct ProxyCache {
    entries: Arc<DashMap<String, Arc<CacheEntry>>>,
    ttl: Duration,
    transport: reqwest::Client,
}

impl ProxyCache {
    /// `skip_verify` disables TLS certificate verification for every target.
    pub fn new(ttl: Duration, skip_verify: bool) -> Result<Self, reqwest::Error> {
        let transport = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_verify)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;

        Ok(Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            transport,
        })
    }

    /// Get a live entry. An expired entry is evicted and reported as absent.
    pub fn get(&self, service_id: &str) -> Option<Arc<CacheEntry>> {
        let found = self.entries.get(service_id).map(|e| e.value().clone());

        let live = match found {
            Some(entry) if entry.is_expired(self.ttl, Instant::now()) => {
                // only evict the entry we saw; a concurrent put may have replaced it
                self.entries
                    .remove_if(service_id, |_, current| Arc::ptr_eq(current, &entry));
                metrics::record_cache_size(self.entries.len());
                tracing::debug!(service_id = %service_id, "Proxy cache entry expired");
                None
            }
            other => other,
        };

        metrics::record_cache_lookup(live.is_some());
        live
    }

    /// Build and store an entry, replacing any previous one.
    pub fn put(
        &self,
        service_id: &str,
        target_url: &str,
        authorization: AuthorizationStrategy,
    ) -> Result<Arc<CacheEntry>, ProxyError> {
        let target_url = parse_target(target_url).map_err(|reason| {
            ProxyError::Internal(format!(
                "service '{}' has an unusable target URL: {}",
                service_id, reason
            ))
        })?;

        let entry = Arc::new(CacheEntry {
            service_id: service_id.to_string(),
            target_url,
            transport: self.transport.clone(),
            authorization: Arc::new(authorization),
            created_at: Instant::now(),
        });

        self.entries.insert(service_id.to_string(), entry.clone());
        metrics::record_cache_size(self.entries.len());

        tracing::debug!(
            service_id = %service_id,
            target = %entry.target_url,
            authorization = entry.authorization.name(),
            "Proxy cache entry stored"
        );
        Ok(entry)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_size(0);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries
            .retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before.saturating_sub(self.entries.len());
        metrics::record_cache_size(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sweep expired entries every `interval` until shutdown.
    pub async fn run_sweeper(self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Proxy cache sweeper starting"
        );

        let mut ticker = time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.evict_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Swept expired proxy cache entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Proxy cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

fn parse_target(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err("missing host".to_string()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}
