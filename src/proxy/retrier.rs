//! One-shot recovery from `403 Forbidden`.
//!
//! A target answering 403 usually means the cached credentials went stale.
//! The retrier resets the entry's strategy, rebuilds the entry from fresh
//! metadata and replays the buffered request exactly once.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;

use crate::http::request::OutboundRequest;
use crate::observability::metrics;
use crate::proxy::cache::CacheEntry;
use crate::proxy::error::ProxyError;
use crate::proxy::forward::execute;

/// Per-request retry state. Never shared between requests.
#[derive(Debug, Default)]
pub struct ForbiddenRetrier {
    retried: bool,
}

impl ForbiddenRetrier {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn retried(&self) -> bool {
        self.retried
    }

    /// Inspect a target response; on the first 403, refresh and replay.
    ///
    /// Returns the response to hand to the caller. Errors raised while
    /// retrying are returned, not swallowed.
    pub async fn on_response<F>(
        &mut self,
        response: reqwest::Response,
        entry: &CacheEntry,
        outbound: &OutboundRequest,
        timeout: Duration,
        rebuild: F,
    ) -> Result<reqwest::Response, ProxyError>
    where
        F: FnOnce() -> Result<Arc<CacheEntry>, ProxyError>,
    {
        if self.retried || response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }
        self.retried = true;

        tracing::info!(
            service_id = %entry.service_id,
            authorization = entry.authorization.name(),
            "Target answered 403, refreshing credentials and retrying once"
        );

        // closes the original body
        drop(response);
        entry.authorization.reset();

        let result = match rebuild() {
            Ok(fresh) => execute(&fresh, outbound, timeout).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(r) if r.status() == StatusCode::FORBIDDEN => "forbidden",
            Ok(_) => "success",
            Err(_) => "error",
        };
        metrics::record_forbidden_retry(outcome);

        match &result {
            Ok(r) => tracing::info!(
                service_id = %entry.service_id,
                status = r.status().as_u16(),
                "Forbidden retry completed"
            ),
            Err(e) => tracing::warn!(
                service_id = %entry.service_id,
                error = %e,
                "Forbidden retry failed"
            ),
        }

        result
    }
}
