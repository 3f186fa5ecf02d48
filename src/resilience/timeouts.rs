//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Each outbound call gets its own deadline; expiry cancels only that call
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::proxy::ProxyError;

/// Run `future` with a deadline, mapping expiry to [`ProxyError::Timeout`].
pub async fn with_timeout<F, T>(service_id: &str, after: Duration, future: F) -> Result<T, ProxyError>
where
    F: Future<Output = T>,
{
    time::timeout(after, future).await.map_err(|_| {
        tracing::warn!(service_id = %service_id, timeout_secs = after.as_secs_f64(), "Outbound call timed out");
        ProxyError::Timeout {
            service_id: service_id.to_string(),
            after,
        }
    })
}
